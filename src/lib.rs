//! RML mapping partitioning and materialization engine
//!
//! Takes a normalized table of [R2RML]/[RML] mapping rules, partitions it so
//! that no two partitions can produce the same triple, and materializes each
//! partition in parallel into N-Quads output with local deduplication.
//!
//! The pipeline has three stages, all driven by [`Materializer::materialize`]:
//!
//! 1. **Normalization** ([`normalize`]): complete missing term types per the
//!    R2RML defaults, expand class assertions into `rdf:type` rules, rewrite
//!    eliminable self-joins, and drop unproductive rules.
//! 2. **Partitioning** ([`partition`]): assign every rule a partition key
//!    from the data-independent invariants of its term maps, using either
//!    cheap per-position grouping or the exhaustive maximal ordering search.
//! 3. **Materialization** ([`materialize`]): fetch rows chunk-by-chunk from
//!    the registered [data sources](source), resolve parent joins (pushed
//!    down as SQL or merged in memory), render RDF terms, and write one
//!    deduplicated `.nq` file per partition on a worker pool.
//!
//! Parsing mapping documents and owning database connections are out of
//! scope: rules arrive as a [`RuleTable`] and data arrives through the
//! [`source::RowSource`] and [`source::RelationalSource`] traits.
//!
//! [R2RML]: https://www.w3.org/TR/r2rml/
//! [RML]: https://rml.io/specs/rml/

pub mod config;
pub mod error;
pub mod materialize;
pub mod model;
pub mod normalize;
pub mod partition;
pub mod pool;
pub mod source;
pub mod vocab;

pub use config::{MaterializationConfig, PartitioningAlgorithm};
pub use error::{RmlError, RmlResult};
pub use materialize::{
    FunctionRegistry, FunctionValue, MapFunctionRegistry, MaterializationReport, Materializer,
    RdfTerm,
};
pub use model::{
    ArgValue, ComputedColumn, FunctionArg, FunctionCall, JoinCondition, LogicalSource, MappingRule,
    Position, RuleTable, Template, TermMap, TermType,
};
pub use partition::{PartitionSummary, FALLBACK_KEY};
pub use source::{CsvSource, MemorySource, SourceRegistry};
