//! Data source collaborators
//!
//! One implementation per source kind. A source exposes chunked, projected
//! row fetches; relational sources additionally execute raw queries,
//! push-down join queries, and schema lookups for datatype inference.
//!
//! The engine owns no connections: each partition task resolves its sources
//! from the registry and drives its own fetch iterators, so nothing is
//! shared across workers.

mod chunk;
mod csv_source;
mod memory;

pub use chunk::{ChunkSchema, Column, FieldInfo, FieldType, RowChunk};
pub use csv_source::CsvSource;
pub use memory::MemorySource;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RmlError, RmlResult};
use crate::model::{JoinCondition, LogicalSource};

/// Iterator of fetched chunks
pub type ChunkIter<'a> = Box<dyn Iterator<Item = RmlResult<RowChunk>> + Send + 'a>;

/// A data source the engine can fetch rows from
pub trait RowSource: Send + Sync {
    /// Fetch the named columns from a logical source in chunks of at most
    /// `chunk_size` rows. Projection (and null filtering, where the backend
    /// supports it) is pushed down to the source.
    fn fetch(
        &self,
        logical_source: &LogicalSource,
        columns: &[String],
        chunk_size: usize,
    ) -> RmlResult<ChunkIter<'_>>;
}

/// A push-down join query against one relational source
///
/// Carries both the rendered SQL (for backends that execute text) and the
/// structured join description (for backends that plan it natively). Result
/// chunks must expose child columns as `child_<name>` and parent columns as
/// `parent_<name>`, matching the SQL aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinQuery {
    /// The rendered SQL text
    pub sql: String,
    /// Child-side table name
    pub child_table: String,
    /// Parent-side table name
    pub parent_table: String,
    /// Columns projected from the child side
    pub child_columns: Vec<String>,
    /// Columns projected from the parent side
    pub parent_columns: Vec<String>,
    /// Equi-join conditions
    pub conditions: Vec<JoinCondition>,
}

/// A relational data source
pub trait RelationalSource: RowSource {
    /// Execute a raw query, yielding chunks of at most `chunk_size` rows.
    fn execute_query(&self, sql: &str, chunk_size: usize) -> RmlResult<ChunkIter<'_>>;

    /// Execute a push-down join query.
    fn execute_join(&self, query: &JoinQuery, chunk_size: usize) -> RmlResult<ChunkIter<'_>>;

    /// Look up the declared type of a column, for datatype inference.
    ///
    /// Failures here are recoverable: the caller tries the next candidate
    /// table and leaves the datatype unset if none succeeds.
    fn column_type(&self, table: &str, column: &str) -> RmlResult<FieldType>;
}

/// A registered data source, tagged by capability
#[derive(Clone)]
pub enum DataSource {
    /// Tabular-only source (files, in-memory tables, APIs)
    Tabular(Arc<dyn RowSource>),
    /// Relational source (supports queries, push-down joins, schema lookup)
    Relational(Arc<dyn RelationalSource>),
}

impl DataSource {
    /// The plain row-fetch view of the source.
    pub fn row_source(&self) -> &dyn RowSource {
        match self {
            DataSource::Tabular(s) => s.as_ref(),
            DataSource::Relational(s) => s.as_ref(),
        }
    }

    /// The relational view, when the source has one.
    pub fn relational(&self) -> Option<&dyn RelationalSource> {
        match self {
            DataSource::Tabular(_) => None,
            DataSource::Relational(s) => Some(s.as_ref()),
        }
    }
}

/// Registry of the data sources a run can read from, keyed by source name
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, DataSource>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tabular source.
    pub fn register_tabular(&mut self, name: impl Into<String>, source: Arc<dyn RowSource>) {
        self.sources.insert(name.into(), DataSource::Tabular(source));
    }

    /// Register a relational source.
    pub fn register_relational(
        &mut self,
        name: impl Into<String>,
        source: Arc<dyn RelationalSource>,
    ) {
        self.sources
            .insert(name.into(), DataSource::Relational(source));
    }

    /// Resolve a source by name.
    pub fn get(&self, name: &str) -> RmlResult<&DataSource> {
        self.sources.get(name).ok_or_else(|| RmlError::SourceQuery {
            source_name: name.to_string(),
            message: "source not registered".to_string(),
        })
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
