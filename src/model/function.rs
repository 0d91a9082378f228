//! Function call specifications for pre-rendering
//!
//! Mapping rules can add computed columns to fetched chunks by invoking the
//! function-execution collaborator. The engine only assembles named argument
//! bindings in order and handles list-result row explosion; function bodies
//! live outside the core.

use serde::{Deserialize, Serialize};

use super::template::Template;

/// A call to an external function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function identifier (an IRI in FnO-style mappings)
    pub function: String,
    /// Named parameter bindings, in declaration order
    pub args: Vec<FunctionArg>,
}

/// One named parameter binding of a function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    /// Parameter name the collaborator dispatches on
    pub name: String,
    /// The value bound to the parameter
    pub value: ArgValue,
}

/// The value bound to a function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    /// A fixed value
    Constant(String),
    /// A template rendered against the current row
    Template(Template),
    /// A column reference resolved against the current row
    Reference(String),
    /// Another function's output; resolved before the enclosing call
    Call(Box<FunctionCall>),
}

impl FunctionCall {
    /// Create a call with no arguments
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
        }
    }

    /// Bind a constant argument
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(FunctionArg {
            name: name.into(),
            value: ArgValue::Constant(value.into()),
        });
        self
    }

    /// Bind a column-reference argument
    pub fn with_reference(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.args.push(FunctionArg {
            name: name.into(),
            value: ArgValue::Reference(column.into()),
        });
        self
    }

    /// Bind a template argument
    pub fn with_template(mut self, name: impl Into<String>, template: Template) -> Self {
        self.args.push(FunctionArg {
            name: name.into(),
            value: ArgValue::Template(template),
        });
        self
    }

    /// Bind a nested function call argument
    pub fn with_call(mut self, name: impl Into<String>, call: FunctionCall) -> Self {
        self.args.push(FunctionArg {
            name: name.into(),
            value: ArgValue::Call(Box::new(call)),
        });
        self
    }

    /// Source columns referenced anywhere in this call tree
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        for arg in &self.args {
            match &arg.value {
                ArgValue::Constant(_) => {}
                ArgValue::Reference(column) => {
                    if !out.contains(&column.as_str()) {
                        out.push(column);
                    }
                }
                ArgValue::Template(template) => {
                    for col in template.references() {
                        if !out.contains(&col) {
                            out.push(col);
                        }
                    }
                }
                ArgValue::Call(call) => call.collect_columns(out),
            }
        }
    }
}
