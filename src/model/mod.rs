//! Mapping rule model
//!
//! The normalized rule table and its constituent types: term maps, templates,
//! join conditions, logical sources, and function call specifications.

mod function;
mod rule;
mod table;
mod template;

pub use function::{ArgValue, FunctionArg, FunctionCall};
pub use rule::{
    ComputedColumn, JoinCondition, LogicalSource, MappingRule, Position, TermMap, TermType,
};
pub use table::RuleTable;
pub use template::{Template, TemplatePart};
