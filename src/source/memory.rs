//! In-memory data source
//!
//! Holds named tables as row chunks. Doubles as a relational source: it
//! answers schema lookups from its chunk schemas, executes push-down join
//! queries from their structured description, and interprets plain
//! single-table `SELECT col, ... FROM table` text for query-backed logical
//! sources. Anything richer than that shape is rejected.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RmlError, RmlResult};
use crate::model::LogicalSource;

use super::{ChunkIter, FieldType, JoinQuery, RelationalSource, RowChunk, RowSource};

static SELECT_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*select\s+(.+?)\s+from\s+([A-Za-z_][A-Za-z0-9_.]*)\s*$")
        .expect("valid regex")
});

/// An in-memory source of named tables
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    tables: HashMap<String, RowChunk>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
        }
    }

    /// Register a table.
    pub fn with_table(mut self, table: impl Into<String>, data: RowChunk) -> Self {
        self.tables.insert(table.into(), data);
        self
    }

    /// Source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn table(&self, table: &str) -> RmlResult<&RowChunk> {
        self.tables.get(table).ok_or_else(|| RmlError::SourceQuery {
            source_name: self.name.clone(),
            message: format!("unknown table '{table}'"),
        })
    }

    fn chunked(data: RowChunk, chunk_size: usize) -> Vec<RmlResult<RowChunk>> {
        let chunk_size = chunk_size.max(1);
        if data.is_empty() {
            return Vec::new();
        }
        (0..data.num_rows())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start, start + chunk_size)))
            .collect()
    }
}

impl RowSource for MemorySource {
    fn fetch(
        &self,
        logical_source: &LogicalSource,
        columns: &[String],
        chunk_size: usize,
    ) -> RmlResult<ChunkIter<'_>> {
        let table_name = match logical_source {
            LogicalSource::Table(name) | LogicalSource::InMemory(name) => name,
            LogicalSource::Query(_) => {
                return Err(RmlError::Unsupported(
                    "in-memory source cannot execute raw queries".to_string(),
                ))
            }
            LogicalSource::File { path, .. } => {
                return Err(RmlError::SourceQuery {
                    source_name: self.name.clone(),
                    message: format!("not a file-backed source: {path}"),
                })
            }
        };
        let projected = self.table(table_name)?.project(columns, &self.name)?;
        Ok(Box::new(Self::chunked(projected, chunk_size).into_iter()))
    }
}

impl RelationalSource for MemorySource {
    fn execute_query(&self, sql: &str, chunk_size: usize) -> RmlResult<ChunkIter<'_>> {
        let captures = SELECT_SHAPE.captures(sql).ok_or_else(|| {
            RmlError::Unsupported(format!(
                "in-memory source only interprets single-table SELECT queries: {sql}"
            ))
        })?;
        let projection = captures[1].trim().to_string();
        let table = self.table(&captures[2])?;
        let result = if projection == "*" {
            table.clone()
        } else {
            let columns: Vec<String> = projection
                .split(',')
                .map(|c| c.trim().to_string())
                .collect();
            table.project(&columns, &self.name)?
        };
        Ok(Box::new(Self::chunked(result, chunk_size).into_iter()))
    }

    fn execute_join(&self, query: &JoinQuery, chunk_size: usize) -> RmlResult<ChunkIter<'_>> {
        let child = self
            .table(&query.child_table)?
            .project(&query.child_columns, &self.name)?;
        let parent = self
            .table(&query.parent_table)?
            .project(&query.parent_columns, &self.name)?;

        // Hash join on the condition columns; null keys never match.
        let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for row in 0..parent.num_rows() {
            let key: Option<Vec<String>> = query
                .conditions
                .iter()
                .map(|jc| parent.value(&jc.parent, row))
                .collect();
            if let Some(key) = key {
                index.entry(key).or_default().push(row);
            }
        }

        let mut child_rows = Vec::new();
        let mut parent_rows = Vec::new();
        for row in 0..child.num_rows() {
            let key: Option<Vec<String>> = query
                .conditions
                .iter()
                .map(|jc| child.value(&jc.child, row))
                .collect();
            if let Some(key) = key {
                if let Some(matches) = index.get(&key) {
                    for &parent_row in matches {
                        child_rows.push(row);
                        parent_rows.push(parent_row);
                    }
                }
            }
        }

        let joined = child
            .take(&child_rows)
            .with_column_prefix("child_")
            .hstack(&parent.take(&parent_rows).with_column_prefix("parent_"))?;
        Ok(Box::new(Self::chunked(joined, chunk_size).into_iter()))
    }

    fn column_type(&self, table: &str, column: &str) -> RmlResult<FieldType> {
        let chunk = self.table(table)?;
        chunk
            .schema()
            .field(column)
            .map(|f| f.field_type)
            .ok_or_else(|| RmlError::ColumnNotFound {
                column: column.to_string(),
                source_name: self.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JoinCondition;

    fn people() -> RowChunk {
        RowChunk::from_string_rows(
            &["id", "name", "dept_id"],
            vec![
                vec![
                    Some("1".to_string()),
                    Some("Alice".to_string()),
                    Some("10".to_string()),
                ],
                vec![
                    Some("2".to_string()),
                    Some("Bob".to_string()),
                    Some("20".to_string()),
                ],
                vec![Some("3".to_string()), Some("Eve".to_string()), None],
            ],
        )
        .unwrap()
    }

    fn depts() -> RowChunk {
        RowChunk::from_string_rows(
            &["id", "label"],
            vec![
                vec![Some("10".to_string()), Some("Sales".to_string())],
                vec![Some("20".to_string()), Some("Ops".to_string())],
            ],
        )
        .unwrap()
    }

    fn source() -> MemorySource {
        MemorySource::new("db")
            .with_table("people", people())
            .with_table("depts", depts())
    }

    #[test]
    fn test_fetch_chunked() {
        let src = source();
        let chunks: Vec<RowChunk> = src
            .fetch(
                &LogicalSource::Table("people".to_string()),
                &["id".to_string(), "name".to_string()],
                2,
            )
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].num_rows(), 2);
        assert_eq!(chunks[1].num_rows(), 1);
        assert_eq!(chunks[1].value("name", 0), Some("Eve".to_string()));
    }

    #[test]
    fn test_fetch_unknown_table() {
        let src = source();
        assert!(src
            .fetch(&LogicalSource::Table("nope".to_string()), &[], 10)
            .is_err());
    }

    #[test]
    fn test_execute_join() {
        let src = source();
        let query = JoinQuery {
            sql: String::new(),
            child_table: "people".to_string(),
            parent_table: "depts".to_string(),
            child_columns: vec!["name".to_string(), "dept_id".to_string()],
            parent_columns: vec!["id".to_string(), "label".to_string()],
            conditions: vec![JoinCondition::new("dept_id", "id")],
        };
        let chunks: Vec<RowChunk> = src
            .execute_join(&query, 100)
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks.len(), 1);
        let joined = &chunks[0];
        // Eve has a null dept_id and must not match.
        assert_eq!(joined.num_rows(), 2);
        assert_eq!(joined.value("child_name", 0), Some("Alice".to_string()));
        assert_eq!(joined.value("parent_label", 0), Some("Sales".to_string()));
        assert_eq!(joined.value("parent_label", 1), Some("Ops".to_string()));
    }

    #[test]
    fn test_execute_query_projects_columns() {
        let src = source();
        let chunks: Vec<RowChunk> = src
            .execute_query("SELECT name, id FROM people", 100)
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks.len(), 1);
        let names: Vec<&str> = chunks[0]
            .schema()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "id"]);
        assert_eq!(chunks[0].value("name", 2), Some("Eve".to_string()));
    }

    #[test]
    fn test_execute_query_star() {
        let src = source();
        let chunks: Vec<RowChunk> = src
            .execute_query("select * from depts", 1)
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].value("label", 0), Some("Sales".to_string()));
    }

    #[test]
    fn test_execute_query_rejects_filters() {
        let src = source();
        assert!(matches!(
            src.execute_query("SELECT id FROM people WHERE id = 1", 100),
            Err(RmlError::Unsupported(_))
        ));
    }

    #[test]
    fn test_column_type_lookup() {
        let src = source();
        assert_eq!(
            src.column_type("people", "name").unwrap(),
            FieldType::String
        );
        assert!(src.column_type("people", "missing").is_err());
        assert!(src.column_type("missing", "name").is_err());
    }
}
