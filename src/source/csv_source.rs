//! CSV file data source
//!
//! Streams a delimited file as string-typed row chunks. Projection happens
//! at read time; values matching the configured null markers become nulls
//! before the engine sees them.

use std::fs::File;

use crate::error::{RmlError, RmlResult};
use crate::model::LogicalSource;

use super::{ChunkIter, RowChunk, RowSource};

/// A CSV-backed tabular source
#[derive(Debug, Clone)]
pub struct CsvSource {
    name: String,
    delimiter: u8,
    null_values: Vec<String>,
}

impl CsvSource {
    /// Create a source reading comma-delimited files.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: b',',
            null_values: vec![String::new()],
        }
    }

    /// Use a different delimiter (e.g. `b'\t'`).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Values to treat as null when read from the file.
    pub fn with_null_values(mut self, null_values: Vec<String>) -> Self {
        self.null_values = null_values;
        self
    }

    /// Source name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RowSource for CsvSource {
    fn fetch(
        &self,
        logical_source: &LogicalSource,
        columns: &[String],
        chunk_size: usize,
    ) -> RmlResult<ChunkIter<'_>> {
        let path = match logical_source {
            LogicalSource::File { path, .. } => path,
            other => {
                return Err(RmlError::SourceQuery {
                    source_name: self.name.clone(),
                    message: format!("not a file-backed logical source: {other:?}"),
                })
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(|e| RmlError::SourceQuery {
                source_name: self.name.clone(),
                message: e.to_string(),
            })?;

        let headers = reader.headers().map_err(|e| RmlError::SourceQuery {
            source_name: self.name.clone(),
            message: e.to_string(),
        })?;

        let mut indices = Vec::with_capacity(columns.len());
        for column in columns {
            let idx = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| RmlError::ColumnNotFound {
                    column: column.clone(),
                    source_name: self.name.clone(),
                })?;
            indices.push(idx);
        }

        Ok(Box::new(CsvChunkIter {
            records: reader.into_records(),
            column_names: columns.to_vec(),
            indices,
            chunk_size: chunk_size.max(1),
            null_values: self.null_values.clone(),
            source_name: self.name.clone(),
            failed: false,
        }))
    }
}

struct CsvChunkIter {
    records: csv::StringRecordsIntoIter<File>,
    column_names: Vec<String>,
    indices: Vec<usize>,
    chunk_size: usize,
    null_values: Vec<String>,
    source_name: String,
    failed: bool,
}

impl Iterator for CsvChunkIter {
    type Item = RmlResult<RowChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(self.chunk_size);
        while rows.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => {
                    let row = self
                        .indices
                        .iter()
                        .map(|&idx| {
                            let raw = record.get(idx).unwrap_or_default();
                            if self.null_values.iter().any(|n| n == raw) {
                                None
                            } else {
                                Some(raw.to_string())
                            }
                        })
                        .collect();
                    rows.push(row);
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(RmlError::SourceQuery {
                        source_name: self.source_name.clone(),
                        message: e.to_string(),
                    }));
                }
                None => break,
            }
        }
        if rows.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.column_names.iter().map(String::as_str).collect();
        Some(RowChunk::from_string_rows(&names, rows))
    }
}
