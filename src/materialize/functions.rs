//! Function pre-rendering
//!
//! Computed columns are evaluated against each fetched chunk before term
//! rendering, so the renderer only ever sees plain columns. The engine binds
//! named arguments in declaration order, resolves nested calls innermost
//! first, explodes rows for list-valued results, and drops rows whose result
//! is null. Function bodies live behind the [`FunctionRegistry`] trait.

use std::collections::HashMap;

use crate::config::MaterializationConfig;
use crate::error::{RmlError, RmlResult};
use crate::model::{ArgValue, ComputedColumn, FunctionCall, TemplatePart};
use crate::source::RowChunk;

/// Result of one function evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionValue {
    /// A single value; `None` drops the row
    Single(Option<String>),
    /// A list of values; the row is repeated once per element, and an empty
    /// list drops the row
    List(Vec<String>),
}

/// Executes mapping functions by identifier
///
/// Implementations dispatch on the function identifier and the named
/// argument bindings. Argument values are lexical strings; `None` marks a
/// null input the function may or may not tolerate.
pub trait FunctionRegistry: Send + Sync {
    /// Evaluate one call. Unknown functions should return
    /// [`RmlError::Function`].
    fn evaluate(
        &self,
        function: &str,
        args: &[(String, Option<String>)],
    ) -> RmlResult<FunctionValue>;
}

/// A registry of closures, keyed by function identifier
///
/// Enough for built-ins and tests; FnO-style dispatch layers sit behind the
/// same trait.
#[derive(Default)]
pub struct MapFunctionRegistry {
    #[allow(clippy::type_complexity)]
    functions: HashMap<
        String,
        Box<dyn Fn(&[(String, Option<String>)]) -> RmlResult<FunctionValue> + Send + Sync>,
    >,
}

impl MapFunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under an identifier.
    pub fn register<F>(&mut self, function: impl Into<String>, body: F)
    where
        F: Fn(&[(String, Option<String>)]) -> RmlResult<FunctionValue> + Send + Sync + 'static,
    {
        self.functions.insert(function.into(), Box::new(body));
    }
}

impl FunctionRegistry for MapFunctionRegistry {
    fn evaluate(
        &self,
        function: &str,
        args: &[(String, Option<String>)],
    ) -> RmlResult<FunctionValue> {
        let body = self
            .functions
            .get(function)
            .ok_or_else(|| RmlError::Function {
                function: function.to_string(),
                message: "function not registered".to_string(),
            })?;
        body(args)
    }
}

impl std::fmt::Debug for MapFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapFunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolve one argument value against a row.
fn resolve_arg(
    value: &ArgValue,
    chunk: &RowChunk,
    row: usize,
    registry: &dyn FunctionRegistry,
    config: &MaterializationConfig,
) -> RmlResult<Option<String>> {
    match value {
        ArgValue::Constant(v) => Ok(Some(v.clone())),
        ArgValue::Reference(column) => Ok(row_value(chunk, row, column, config)),
        ArgValue::Template(template) => {
            let mut out = String::new();
            for part in template.parts() {
                match part {
                    TemplatePart::Literal(text) => out.push_str(text),
                    TemplatePart::Placeholder(column) => {
                        match row_value(chunk, row, column, config) {
                            Some(v) => out.push_str(&v),
                            None => return Ok(None),
                        }
                    }
                }
            }
            Ok(Some(out))
        }
        ArgValue::Call(call) => match evaluate_call(call, chunk, row, registry, config)? {
            FunctionValue::Single(v) => Ok(v),
            FunctionValue::List(_) => Err(RmlError::Function {
                function: call.function.clone(),
                message: "list-valued result in nested argument position".to_string(),
            }),
        },
    }
}

fn row_value(
    chunk: &RowChunk,
    row: usize,
    column: &str,
    config: &MaterializationConfig,
) -> Option<String> {
    let value = chunk.value(column, row)?;
    if config.is_null_value(&value) {
        None
    } else {
        Some(value)
    }
}

/// Evaluate a call for one row, nested arguments first.
fn evaluate_call(
    call: &FunctionCall,
    chunk: &RowChunk,
    row: usize,
    registry: &dyn FunctionRegistry,
    config: &MaterializationConfig,
) -> RmlResult<FunctionValue> {
    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        let resolved = resolve_arg(&arg.value, chunk, row, registry, config)?;
        args.push((arg.name.clone(), resolved));
    }
    registry.evaluate(&call.function, &args)
}

/// Apply a rule's computed columns to a fetched chunk.
///
/// Columns are added in declaration order, so later columns can consume
/// earlier ones. Null results drop the row; list results repeat it once per
/// element.
pub(crate) fn apply_computed_columns(
    chunk: RowChunk,
    computed: &[ComputedColumn],
    registry: &dyn FunctionRegistry,
    config: &MaterializationConfig,
) -> RmlResult<RowChunk> {
    let mut current = chunk;
    for column in computed {
        let mut keep_rows: Vec<usize> = Vec::with_capacity(current.num_rows());
        let mut values: Vec<Option<String>> = Vec::with_capacity(current.num_rows());
        for row in 0..current.num_rows() {
            match evaluate_call(&column.call, &current, row, registry, config)? {
                FunctionValue::Single(Some(v)) if !config.is_null_value(&v) => {
                    keep_rows.push(row);
                    values.push(Some(v));
                }
                FunctionValue::Single(_) => {}
                FunctionValue::List(items) => {
                    for item in items {
                        if !config.is_null_value(&item) {
                            keep_rows.push(row);
                            values.push(Some(item));
                        }
                    }
                }
            }
        }
        current = current.take(&keep_rows).with_string_column(&column.name, values)?;
    }
    Ok(current)
}
