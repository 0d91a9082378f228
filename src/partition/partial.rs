//! Partial-aggregation partitioning
//!
//! Groups each quad position independently over the whole rule table and
//! concatenates the four group numbers into the `S-P-O-G` key. Cheap (one
//! sort per position) but can under-split: a position's grouping is never
//! refined per sub-group of another position.

use super::grouping::{group_position, Facet};
use crate::model::{MappingRule, Position};

/// Compute a partition key per rule using partial aggregation.
pub(crate) fn partial_keys(rules: &[&MappingRule]) -> Vec<String> {
    let per_position: Vec<Vec<String>> = Position::ALL
        .iter()
        .map(|&position| {
            let facets: Vec<Facet> = rules.iter().map(|r| Facet::of(r, position)).collect();
            group_position(&facets)
        })
        .collect();

    (0..rules.len())
        .map(|idx| {
            let digits: Vec<&str> = per_position.iter().map(|p| p[idx].as_str()).collect();
            digits.join("-")
        })
        .collect()
}
