//! Join staging for parent-join object maps
//!
//! Two strategies. When both sides are plain tables of the same relational
//! source and push-down is enabled, the join is rendered as one SQL query
//! the source executes natively. Otherwise the engine merges chunks itself:
//! for each child chunk, the parent side is re-fetched and hash-joined in
//! memory, with `child_`/`parent_` column prefixes keeping the two sides
//! apart.

use std::collections::HashMap;

use crate::error::{RmlError, RmlResult};
use crate::model::{JoinCondition, MappingRule};
use crate::source::{DataSource, JoinQuery, RowChunk};

/// Whether a parent join can be pushed down to the source as SQL.
pub(crate) fn push_down_applicable(
    rule: &MappingRule,
    parent: &MappingRule,
    source: &DataSource,
    push_down_enabled: bool,
) -> bool {
    push_down_enabled
        && rule.source_name == parent.source_name
        && rule.logical_source.is_table()
        && parent.logical_source.is_table()
        && rule.computed_columns.is_empty()
        && parent.computed_columns.is_empty()
        && source.relational().is_some()
}

/// Columns fetched from the child side: everything the child's term maps and
/// functions reference, plus the child join columns.
pub(crate) fn child_columns(rule: &MappingRule, conditions: &[JoinCondition]) -> Vec<String> {
    let mut columns = rule.needed_columns();
    for jc in conditions {
        if !columns.iter().any(|c| c == &jc.child) {
            columns.push(jc.child.clone());
        }
    }
    columns
}

/// Columns fetched from the parent side: the parent subject's references
/// plus the parent join columns. Computed-column names are excluded; their
/// function inputs are fetched instead and the columns themselves are added
/// to the parent chunk before merging.
pub(crate) fn parent_columns(parent: &MappingRule, conditions: &[JoinCondition]) -> Vec<String> {
    let computed = parent.computed_column_names();
    let mut columns: Vec<String> = Vec::new();
    let mut push = |col: &str| {
        if !computed.contains(&col) && !columns.iter().any(|c| c == col) {
            columns.push(col.to_string());
        }
    };
    for col in parent.subject.referenced_columns() {
        push(col);
    }
    for computed_col in &parent.computed_columns {
        for col in computed_col.call.referenced_columns() {
            push(col);
        }
    }
    for jc in conditions {
        push(&jc.parent);
    }
    columns
}

/// Build the push-down join query for a child rule and its parent.
///
/// The SQL projects every column under its prefixed alias so result chunks
/// line up with the in-memory merge layout.
pub(crate) fn build_join_query(
    rule: &MappingRule,
    parent: &MappingRule,
    conditions: &[JoinCondition],
) -> RmlResult<JoinQuery> {
    let child_table = rule
        .logical_source
        .table_name()
        .ok_or_else(|| RmlError::Materialization("push-down join needs a child table".to_string()))?
        .to_string();
    let parent_table = parent
        .logical_source
        .table_name()
        .ok_or_else(|| {
            RmlError::Materialization("push-down join needs a parent table".to_string())
        })?
        .to_string();

    let child_cols = child_columns(rule, conditions);
    let parent_cols = parent_columns(parent, conditions);

    let mut projections: Vec<String> = child_cols
        .iter()
        .map(|c| format!("child.{c} AS child_{c}"))
        .collect();
    projections.extend(
        parent_cols
            .iter()
            .map(|c| format!("parent.{c} AS parent_{c}")),
    );

    let on_clause = conditions
        .iter()
        .map(|jc| format!("child.{} = parent.{}", jc.child, jc.parent))
        .collect::<Vec<_>>()
        .join(" AND ");

    let sql = format!(
        "SELECT {} FROM {child_table} AS child INNER JOIN {parent_table} AS parent ON {on_clause}",
        projections.join(", "),
    );

    Ok(JoinQuery {
        sql,
        child_table,
        parent_table,
        child_columns: child_cols,
        parent_columns: parent_cols,
        conditions: conditions.to_vec(),
    })
}

/// Hash-join one child chunk against one parent chunk.
///
/// Null join keys never match. The merged chunk carries child columns as
/// `child_<name>` and parent columns as `parent_<name>`.
pub(crate) fn merge_chunks(
    child: &RowChunk,
    parent: &RowChunk,
    conditions: &[JoinCondition],
) -> RmlResult<RowChunk> {
    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for row in 0..parent.num_rows() {
        let key: Option<Vec<String>> = conditions
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
        let key: Option<Vec<String>> = conditions
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

    child
        .take(&child_rows)
        .with_column_prefix("child_")
        .hstack(&parent.take(&parent_rows).with_column_prefix("parent_"))
}
