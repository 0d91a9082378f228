//! Columnar row chunks
//!
//! Fetched data moves through the engine as bounded-size chunks in columnar
//! form: typed `Vec<Option<T>>` per column with schema information, no
//! string-keyed row maps in hot paths. Chunk size bounds memory for a single
//! rule's data.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RmlError, RmlResult};

/// Column field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Days since 1970-01-01
    Date,
    /// Microseconds since epoch (UTC)
    Timestamp,
    Decimal {
        precision: u8,
        scale: i8,
    },
}

/// Field definition for one chunk column
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Column name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
}

/// Schema for a row chunk
#[derive(Debug, Clone)]
pub struct ChunkSchema {
    /// Field definitions in column order
    pub fields: Vec<FieldInfo>,
    name_to_index: HashMap<String, usize>,
}

impl ChunkSchema {
    /// Create a schema from field definitions.
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let name_to_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            fields,
            name_to_index,
        }
    }

    /// Column index by name.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Field info by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Number of columns.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

/// Column storage: typed arrays with nullable values
#[derive(Debug, Clone)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Bytes(Vec<Option<Vec<u8>>>),
    Date(Vec<Option<i32>>),
    Timestamp(Vec<Option<i64>>),
    Decimal {
        values: Vec<Option<i128>>,
        precision: u8,
        scale: i8,
    },
}

impl Column {
    /// Number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Boolean(v) => v.len(),
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Float32(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::String(v) => v.len(),
            Column::Bytes(v) => v.len(),
            Column::Date(v) => v.len(),
            Column::Timestamp(v) => v.len(),
            Column::Decimal { values, .. } => values.len(),
        }
    }

    /// Whether the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value at `row` is null (or out of range).
    pub fn is_null(&self, row: usize) -> bool {
        self.value_to_string(row).is_none()
    }

    /// Render the value at `row` as its lexical string form.
    ///
    /// Returns `None` for nulls. Dates and timestamps render as ISO 8601;
    /// decimals honor their scale; bytes render as lowercase hex.
    pub fn value_to_string(&self, row: usize) -> Option<String> {
        match self {
            Column::Boolean(v) => v.get(row)?.map(|b| b.to_string()),
            Column::Int32(v) => v.get(row)?.map(|n| n.to_string()),
            Column::Int64(v) => v.get(row)?.map(|n| n.to_string()),
            Column::Float32(v) => v.get(row)?.map(|n| n.to_string()),
            Column::Float64(v) => v.get(row)?.map(|n| n.to_string()),
            Column::String(v) => v.get(row)?.clone(),
            Column::Bytes(v) => v
                .get(row)?
                .as_ref()
                .map(|b| b.iter().map(|byte| format!("{byte:02x}")).collect()),
            Column::Date(v) => v.get(row)?.map(format_date),
            Column::Timestamp(v) => v.get(row)?.map(format_timestamp),
            Column::Decimal { values, scale, .. } => {
                values.get(row)?.map(|n| format_decimal(n, *scale))
            }
        }
    }

    /// Gather the values at the given rows into a new column.
    pub fn take(&self, rows: &[usize]) -> Column {
        fn gather<T: Clone>(v: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
            rows.iter().map(|&r| v.get(r).cloned().flatten()).collect()
        }
        match self {
            Column::Boolean(v) => Column::Boolean(gather(v, rows)),
            Column::Int32(v) => Column::Int32(gather(v, rows)),
            Column::Int64(v) => Column::Int64(gather(v, rows)),
            Column::Float32(v) => Column::Float32(gather(v, rows)),
            Column::Float64(v) => Column::Float64(gather(v, rows)),
            Column::String(v) => Column::String(gather(v, rows)),
            Column::Bytes(v) => Column::Bytes(gather(v, rows)),
            Column::Date(v) => Column::Date(gather(v, rows)),
            Column::Timestamp(v) => Column::Timestamp(gather(v, rows)),
            Column::Decimal {
                values,
                precision,
                scale,
            } => Column::Decimal {
                values: gather(values, rows),
                precision: *precision,
                scale: *scale,
            },
        }
    }

    /// Slice out rows `[start, end)` into a new column.
    pub fn slice(&self, start: usize, end: usize) -> Column {
        let rows: Vec<usize> = (start..end).collect();
        self.take(&rows)
    }
}

/// A bounded chunk of rows in columnar form
#[derive(Debug, Clone)]
pub struct RowChunk {
    schema: Arc<ChunkSchema>,
    columns: Vec<Column>,
    num_rows: usize,
}

impl RowChunk {
    /// Create a chunk, validating that column count and lengths agree with
    /// the schema.
    pub fn new(schema: Arc<ChunkSchema>, columns: Vec<Column>) -> RmlResult<Self> {
        if columns.len() != schema.num_fields() {
            return Err(RmlError::Materialization(format!(
                "chunk has {} columns but schema has {} fields",
                columns.len(),
                schema.num_fields()
            )));
        }
        let num_rows = columns.first().map_or(0, Column::len);
        if columns.iter().any(|c| c.len() != num_rows) {
            return Err(RmlError::Materialization(
                "chunk columns have differing lengths".to_string(),
            ));
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Build an all-string chunk from row-major data. Convenience for
    /// in-memory sources and tests.
    pub fn from_string_rows(
        column_names: &[&str],
        rows: Vec<Vec<Option<String>>>,
    ) -> RmlResult<Self> {
        let schema = Arc::new(ChunkSchema::new(
            column_names
                .iter()
                .map(|name| FieldInfo {
                    name: (*name).to_string(),
                    field_type: FieldType::String,
                })
                .collect(),
        ));
        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); column_names.len()];
        for row in rows {
            if row.len() != column_names.len() {
                return Err(RmlError::Materialization(format!(
                    "row has {} values but {} columns were declared",
                    row.len(),
                    column_names.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Self::new(schema, columns.into_iter().map(Column::String).collect())
    }

    /// The chunk schema.
    pub fn schema(&self) -> &ChunkSchema {
        &self.schema
    }

    /// Number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Whether the chunk has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|i| &self.columns[i])
    }

    /// Value at `(column, row)` as its lexical string form; `None` for nulls
    /// and unknown columns.
    pub fn value(&self, column: &str, row: usize) -> Option<String> {
        self.column(column)?.value_to_string(row)
    }

    /// Project the chunk down to the named columns, in the given order.
    ///
    /// Unknown columns are an error: the caller computed the needed set from
    /// the rule, so a miss means the mapping references a column the source
    /// does not provide.
    pub fn project(&self, column_names: &[String], source_name: &str) -> RmlResult<RowChunk> {
        let mut fields = Vec::with_capacity(column_names.len());
        let mut columns = Vec::with_capacity(column_names.len());
        for name in column_names {
            let idx = self
                .schema
                .index_of(name)
                .ok_or_else(|| RmlError::ColumnNotFound {
                    column: name.clone(),
                    source_name: source_name.to_string(),
                })?;
            fields.push(self.schema.fields[idx].clone());
            columns.push(self.columns[idx].clone());
        }
        RowChunk::new(Arc::new(ChunkSchema::new(fields)), columns)
    }

    /// Rename every column with a prefix (join staging).
    pub fn with_column_prefix(&self, prefix: &str) -> RowChunk {
        let fields = self
            .schema
            .fields
            .iter()
            .map(|f| FieldInfo {
                name: format!("{prefix}{}", f.name),
                field_type: f.field_type,
            })
            .collect();
        RowChunk {
            schema: Arc::new(ChunkSchema::new(fields)),
            columns: self.columns.clone(),
            num_rows: self.num_rows,
        }
    }

    /// Gather the given rows into a new chunk.
    pub fn take(&self, rows: &[usize]) -> RowChunk {
        RowChunk {
            schema: Arc::clone(&self.schema),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            num_rows: rows.len(),
        }
    }

    /// Slice out rows `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> RowChunk {
        let end = end.min(self.num_rows);
        let start = start.min(end);
        RowChunk {
            schema: Arc::clone(&self.schema),
            columns: self.columns.iter().map(|c| c.slice(start, end)).collect(),
            num_rows: end - start,
        }
    }

    /// Stack two chunks of equal row count side by side.
    pub fn hstack(&self, other: &RowChunk) -> RmlResult<RowChunk> {
        if self.num_rows != other.num_rows {
            return Err(RmlError::Materialization(format!(
                "cannot stack chunks of {} and {} rows",
                self.num_rows, other.num_rows
            )));
        }
        let mut fields = self.schema.fields.clone();
        fields.extend(other.schema.fields.iter().cloned());
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        RowChunk::new(Arc::new(ChunkSchema::new(fields)), columns)
    }

    /// Append a string column computed per row (function pre-rendering).
    pub fn with_string_column(
        &self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> RmlResult<RowChunk> {
        if values.len() != self.num_rows {
            return Err(RmlError::Materialization(format!(
                "computed column has {} values for {} rows",
                values.len(),
                self.num_rows
            )));
        }
        let mut fields = self.schema.fields.clone();
        fields.push(FieldInfo {
            name: name.into(),
            field_type: FieldType::String,
        });
        let mut columns = self.columns.clone();
        columns.push(Column::String(values));
        RowChunk::new(Arc::new(ChunkSchema::new(fields)), columns)
    }
}

/// Format days-since-epoch as an ISO 8601 date.
fn format_date(days: i32) -> String {
    let (year, month, day) = civil_from_days(days as i64);
    format!("{year:04}-{month:02}-{day:02}")
}

/// Format microseconds-since-epoch as an ISO 8601 timestamp (UTC).
fn format_timestamp(micros: i64) -> String {
    let micros_part = micros.rem_euclid(1_000_000);
    let seconds = (micros - micros_part) / 1_000_000;
    let secs_of_day = seconds.rem_euclid(86_400);
    let days = (seconds - secs_of_day) / 86_400;

    let (year, month, day) = civil_from_days(days);
    let (hours, minutes, secs) = (secs_of_day / 3600, (secs_of_day % 3600) / 60, secs_of_day % 60);

    if micros_part > 0 {
        format!(
            "{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{secs:02}.{micros_part:06}Z"
        )
    } else {
        format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{secs:02}Z")
    }
}

/// Gregorian civil date from days since 1970-01-01 (Howard Hinnant's
/// days-from-civil inverse).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Format a decimal's unscaled value with its scale.
fn format_decimal(unscaled: i128, scale: i8) -> String {
    if scale <= 0 {
        let multiplier = 10i128.pow((-scale) as u32);
        (unscaled * multiplier).to_string()
    } else {
        let divisor = 10i128.pow(scale as u32);
        let integer_part = unscaled / divisor;
        let fractional_part = (unscaled % divisor).unsigned_abs();
        let sign = if unscaled < 0 && integer_part == 0 { "-" } else { "" };
        format!(
            "{sign}{integer_part}.{fractional_part:0>width$}",
            width = scale as usize
        )
    }
}
