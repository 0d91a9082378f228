//! Mapping partitioning
//!
//! Assigns every rule a partition key such that rules with different keys can
//! never produce the same quad. Partitions are therefore independent units of
//! work: they deduplicate locally and run in parallel with no cross-partition
//! synchronization.
//!
//! Two algorithms are offered: cheap [`partial-aggregation`] grouping (the
//! default) and the exhaustive [`maximal`] ordering search. Both share the
//! per-position grouping primitive in [`grouping`]. Rules that cannot be
//! partitioned (non-asserted triples maps, or a disabled partitioner) fall
//! back to the fixed key [`FALLBACK_KEY`].
//!
//! [`partial-aggregation`]: partial
//! [`maximal`]: maximal

mod grouping;
pub(crate) mod maximal;
pub(crate) mod partial;

use tracing::{info, warn};

use crate::config::PartitioningAlgorithm;
use crate::error::RmlResult;
use crate::model::{MappingRule, RuleTable};
use crate::pool::WorkerPool;

/// Fixed key for rules excluded from partitioning.
///
/// Computed keys can never collide with it: predicate and graph group
/// numbers always start at 1, so no computed key is all zeros.
pub const FALLBACK_KEY: &str = "0-0-0-0";

/// Outcome of a partitioning pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    /// Algorithm that ran
    pub algorithm: PartitioningAlgorithm,
    /// Number of distinct partition keys assigned
    pub partitions: usize,
    /// Number of rules sent to the fallback partition
    pub fallback_rules: usize,
}

/// Assign partition keys to every rule in the table.
///
/// Keys are stable for the rest of the run; nothing downstream recomputes
/// them. Non-asserted rules (RDF-star constructs the key scheme cannot
/// cover) always receive [`FALLBACK_KEY`], whatever the algorithm.
pub fn assign_partition_keys(
    table: &mut RuleTable,
    algorithm: PartitioningAlgorithm,
    pool: &WorkerPool,
) -> RmlResult<PartitionSummary> {
    let fallback_rules = match algorithm {
        PartitioningAlgorithm::None => {
            for rule in table.rules_mut() {
                rule.partition_key = FALLBACK_KEY.to_string();
            }
            table.len()
        }
        PartitioningAlgorithm::PartialAggregation | PartitioningAlgorithm::Maximal => {
            let (asserted_idx, fallback_idx): (Vec<usize>, Vec<usize>) =
                (0..table.len()).partition(|&i| table.rules()[i].asserted);

            if !fallback_idx.is_empty() {
                warn!(
                    rules = fallback_idx.len(),
                    "non-asserted rules assigned to the fallback partition"
                );
            }

            let asserted: Vec<&MappingRule> =
                asserted_idx.iter().map(|&i| &table.rules()[i]).collect();
            let keys = match algorithm {
                PartitioningAlgorithm::PartialAggregation => partial::partial_keys(&asserted),
                PartitioningAlgorithm::Maximal => maximal::maximal_keys(&asserted, pool),
                PartitioningAlgorithm::None => unreachable!(),
            };

            let rules = table.rules_mut();
            for (&i, key) in asserted_idx.iter().zip(keys) {
                rules[i].partition_key = key;
            }
            for &i in &fallback_idx {
                rules[i].partition_key = FALLBACK_KEY.to_string();
            }
            fallback_idx.len()
        }
    };

    let partitions = table.partitions().len();
    info!(
        ?algorithm,
        rules = table.len(),
        partitions,
        fallback_rules,
        "partitioning complete"
    );
    Ok(PartitionSummary {
        algorithm,
        partitions,
        fallback_rules,
    })
}
