//! Materialization error types

use thiserror::Error;

/// Errors produced by the mapping-partitioning and materialization engine
#[derive(Debug, Error)]
pub enum RmlError {
    /// Rule table failed structural validation
    #[error("Invalid rule table: {0}")]
    InvalidRuleTable(String),

    /// A ParentJoin references a triples map id that does not resolve
    ///
    /// Parent ids are pre-validated upstream, so hitting this is a
    /// programming-contract violation rather than a data error.
    #[error("Unknown triples map: {0}")]
    UnknownTriplesMap(String),

    /// Invalid template syntax (unbalanced or empty placeholder)
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// A data source query failed to execute (fatal for its partition)
    #[error("Source query failed on '{source_name}': {message}")]
    SourceQuery {
        source_name: String,
        message: String,
    },

    /// A referenced column does not exist in the fetched data
    #[error("Column not found: {column} in source {source_name}")]
    ColumnNotFound {
        column: String,
        source_name: String,
    },

    /// Term materialization error
    #[error("Materialization error: {0}")]
    Materialization(String),

    /// Function-execution collaborator failure
    #[error("Function execution failed for <{function}>: {message}")]
    Function { function: String, message: String },

    /// Worker pool construction failure
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Output I/O failure
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Result type for materialization operations
pub type RmlResult<T> = Result<T, RmlError>;
