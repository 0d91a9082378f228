//! Per-position grouping primitives
//!
//! Both partitioning algorithms reduce to the same step: given the facet of
//! every rule at one quad position, assign group labels such that rules in
//! different groups can never render the same term at that position.

use crate::model::{MappingRule, Position, TermType};
use crate::vocab::R2RML;

/// Group label for blank-node terms.
///
/// Blank node identity is not derivable from content, so all blank-valued
/// terms collapse into this fixed group. Computed groups start at 1, so the
/// label never collides.
pub(crate) const BLANK_GROUP: &str = "0";

/// What the partitioner knows about one rule at one quad position
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Facet {
    /// Term renders blank nodes; grouped as [`BLANK_GROUP`] unconditionally
    pub blank: bool,
    /// The invariant is the exact output, not just a prefix
    pub exact: bool,
    /// Data-independent output prefix; empty when the term has no invariant
    pub invariant: String,
    /// `(language, datatype)` bucket; non-empty only for object literals
    pub bucket: (String, String),
}

impl Facet {
    /// Compute the facet of a rule at a position.
    pub(crate) fn of(rule: &MappingRule, position: Position) -> Self {
        let termtype = rule.termtype(position);
        let blank = matches!(position, Position::Subject | Position::Object)
            && termtype == TermType::BlankNode;

        let (exact, invariant) = match rule.term(position) {
            Some(term) => match term.invariant() {
                Some(inv) => (term.is_constant(), inv.to_string()),
                None => (false, String::new()),
            },
            // An absent graph map is the default graph: a known constant.
            None if position == Position::Graph => (true, R2RML::DEFAULT_GRAPH.to_string()),
            None => (false, String::new()),
        };

        let bucket = if position == Position::Object && termtype == TermType::Literal {
            (
                rule.object_language.clone().unwrap_or_default(),
                rule.object_datatype.clone().unwrap_or_default(),
            )
        } else {
            (String::new(), String::new())
        };

        Self {
            blank,
            exact,
            invariant,
            bucket,
        }
    }
}

/// Assign group labels for one position.
///
/// Returns one label per facet, aligned with the input order. Non-blank
/// facets are sorted by `(bucket, invariant)` and walked with a running
/// group counter: a row joins the current group when its invariant extends
/// the group's invariant (prefix mode) or equals it (exact mode, used when
/// every term at the position is a constant). A new `(language, datatype)`
/// bucket always starts a new group.
pub(crate) fn group_position(facets: &[Facet]) -> Vec<String> {
    let mut labels = vec![String::new(); facets.len()];

    let mut indices: Vec<usize> = Vec::with_capacity(facets.len());
    for (idx, facet) in facets.iter().enumerate() {
        if facet.blank {
            labels[idx] = BLANK_GROUP.to_string();
        } else {
            indices.push(idx);
        }
    }

    // Exact equality yields strictly finer partitions, but is only sound
    // when no invariant is a mere prefix of the possible outputs.
    let exact_mode = indices.iter().all(|&i| facets[i].exact);

    indices.sort_by(|&a, &b| {
        facets[a]
            .bucket
            .cmp(&facets[b].bucket)
            .then_with(|| facets[a].invariant.cmp(&facets[b].invariant))
    });

    let mut counter: u64 = 0;
    let mut current: Option<(&(String, String), &str)> = None;
    for &idx in &indices {
        let facet = &facets[idx];
        let joins_current = match current {
            Some((bucket, invariant)) if *bucket == facet.bucket => {
                if exact_mode {
                    facet.invariant == invariant
                } else {
                    facet.invariant.starts_with(invariant)
                }
            }
            _ => false,
        };
        if !joins_current {
            counter += 1;
            current = Some((&facet.bucket, &facet.invariant));
        }
        labels[idx] = counter.to_string();
    }

    labels
}
