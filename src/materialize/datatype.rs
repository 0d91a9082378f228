//! SQL datatype inference for literal objects
//!
//! R2RML natural mapping: when a literal object is a direct column reference
//! with no explicit datatype or language, the column's declared SQL type
//! picks the XSD datatype. Lookup failures are recoverable; the literal just
//! stays plain.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::model::{LogicalSource, MappingRule, TermMap};
use crate::source::{FieldType, RelationalSource};
use crate::vocab::XSD;

/// Table names referenced by a logical source, in order of appearance.
///
/// Plain table references yield themselves; raw queries are scanned for
/// `FROM`/`JOIN` targets. Subqueries and quoted identifiers are out of scope
/// for this scan; a miss only means no inference.
static TABLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:from|join)\s+([A-Za-z_][A-Za-z0-9_.]*)").expect("valid regex")
});

fn candidate_tables(logical_source: &LogicalSource) -> Vec<String> {
    match logical_source {
        LogicalSource::Table(name) => vec![name.clone()],
        LogicalSource::Query(sql) => TABLE_REF
            .captures_iter(sql)
            .map(|c| c[1].to_string())
            .collect(),
        LogicalSource::File { .. } | LogicalSource::InMemory(_) => Vec::new(),
    }
}

/// Map a declared field type to its XSD datatype IRI.
///
/// Strings map to no datatype at all: a plain literal, not `xsd:string`.
fn xsd_for_field(field_type: FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::Boolean => Some(XSD::BOOLEAN),
        FieldType::Int32 | FieldType::Int64 => Some(XSD::INTEGER),
        FieldType::Float32 | FieldType::Float64 => Some(XSD::DOUBLE),
        FieldType::Decimal { .. } => Some(XSD::DECIMAL),
        FieldType::Date => Some(XSD::DATE),
        FieldType::Timestamp => Some(XSD::DATE_TIME),
        FieldType::Bytes => Some(XSD::HEX_BINARY),
        FieldType::String => None,
    }
}

/// Infer the object datatype for a rule against its relational source.
///
/// Only applies to reference-valued literal objects with no explicit
/// datatype or language. Candidate tables are tried in order until one
/// lookup succeeds; per-table failures are logged and skipped.
pub(crate) fn infer_object_datatype(
    rule: &MappingRule,
    source: &dyn RelationalSource,
) -> Option<String> {
    if rule.object_datatype.is_some() || rule.object_language.is_some() {
        return None;
    }
    let column = match &rule.object {
        Some(TermMap::Reference(column)) if rule.termtype(crate::model::Position::Object).is_literal() => {
            column
        }
        _ => return None,
    };

    for table in candidate_tables(&rule.logical_source) {
        match source.column_type(&table, column) {
            Ok(field_type) => return xsd_for_field(field_type).map(str::to_string),
            Err(e) => {
                debug!(table = %table, column = %column, error = %e, "datatype lookup failed");
            }
        }
    }
    None
}
