//! Materialization run configuration
//!
//! The configuration surface consumed by the core engine. Parsing this from
//! a config file or CLI flags belongs to the embedding application; the
//! engine only reads the resolved values. Configuration is read-only for the
//! lifetime of a run and cloned into each worker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Mapping-partitioning algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PartitioningAlgorithm {
    /// No partitioning: every rule lands in a single partition (`0-0-0-0`)
    None,
    /// Per-position grouping over the whole table (default)
    #[default]
    PartialAggregation,
    /// Hierarchical grouping; searches all 24 position orderings and keeps
    /// the one producing the most partitions
    Maximal,
}

/// Configuration for one materialization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializationConfig {
    /// Size of the worker pool. One partition is one unit of work.
    pub workers: usize,

    /// Maximum number of rows fetched from a source per chunk.
    ///
    /// Bounds memory for a single rule's data: the in-memory join strategy
    /// holds at most one child chunk and one parent chunk at a time.
    pub chunk_size: usize,

    /// Which partitioning algorithm to run before materialization.
    pub algorithm: PartitioningAlgorithm,

    /// Values treated as null when fetched from a source. A row whose needed
    /// reference resolves to one of these produces no triple.
    pub null_values: Vec<String>,

    /// Strip non-printable characters from referenced values before
    /// IRI percent-encoding.
    pub only_printable: bool,

    /// Emit an explicit graph term for the default graph instead of
    /// omitting it from quad output.
    pub materialize_default_graph: bool,

    /// Push joins down into the relational source as a single SQL query
    /// when child and parent share the source and both are plain tables.
    pub push_down_sql_joins: bool,

    /// Infer missing literal datatypes from relational source schemas.
    pub infer_sql_datatypes: bool,

    /// Directory receiving one N-Quads file per partition.
    pub output_dir: PathBuf,
}

impl Default for MaterializationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            chunk_size: 100_000,
            algorithm: PartitioningAlgorithm::default(),
            null_values: vec![String::new()],
            only_printable: false,
            materialize_default_graph: false,
            push_down_sql_joins: true,
            infer_sql_datatypes: true,
            output_dir: PathBuf::from("out"),
        }
    }
}

impl MaterializationConfig {
    /// Check whether a fetched value counts as null under this configuration.
    pub fn is_null_value(&self, value: &str) -> bool {
        self.null_values.iter().any(|n| n == value)
    }
}
