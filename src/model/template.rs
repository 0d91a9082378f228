//! Term map templates
//!
//! A template interleaves literal text with `{column}` placeholders. Braces
//! can be escaped as `\{` and `\}` to appear literally in the output; escaped
//! braces never open or close a placeholder.
//!
//! Templates are parsed once at rule construction time. The parsed form keeps
//! the ordered fragments so rendering is a single pass, and exposes the
//! *invariant prefix*: the literal text before the first placeholder, which is
//! guaranteed to prefix every value the template can ever produce. The
//! partitioner's no-overlap proof rests on that guarantee.

use serde::{Deserialize, Serialize};

use crate::error::{RmlError, RmlResult};

/// One fragment of a parsed template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplatePart {
    /// Literal text, with escape sequences already resolved
    Literal(String),
    /// A `{column}` placeholder
    Placeholder(String),
}

/// A parsed term map template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Template {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Fails on unbalanced braces, nested placeholders, and empty
    /// placeholders.
    pub fn parse(raw: impl Into<String>) -> RmlResult<Self> {
        let raw = raw.into();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut placeholder: Option<String> = None;
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    // Escape applies to the next character; a trailing
                    // backslash stands for itself.
                    let target = match placeholder.as_mut() {
                        Some(p) => p,
                        None => &mut literal,
                    };
                    match chars.next() {
                        Some(next) => target.push(next),
                        None => target.push('\\'),
                    }
                }
                '{' => {
                    if placeholder.is_some() {
                        return Err(RmlError::InvalidTemplate(format!(
                            "nested '{{' in template: {raw}"
                        )));
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    placeholder = Some(String::new());
                }
                '}' => match placeholder.take() {
                    Some(name) if name.is_empty() => {
                        return Err(RmlError::InvalidTemplate(format!(
                            "empty placeholder in template: {raw}"
                        )));
                    }
                    Some(name) => parts.push(TemplatePart::Placeholder(name)),
                    None => {
                        return Err(RmlError::InvalidTemplate(format!(
                            "unmatched '}}' in template: {raw}"
                        )));
                    }
                },
                c => match placeholder.as_mut() {
                    Some(p) => p.push(c),
                    None => literal.push(c),
                },
            }
        }

        if placeholder.is_some() {
            return Err(RmlError::InvalidTemplate(format!(
                "unmatched '{{' in template: {raw}"
            )));
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Ok(Self { raw, parts })
    }

    /// The original template text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The ordered fragments of the template.
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// The literal text before the first placeholder.
    ///
    /// Every value this template renders starts with this prefix, data
    /// notwithstanding. Empty when the template opens with a placeholder.
    pub fn invariant_prefix(&self) -> &str {
        match self.parts.first() {
            Some(TemplatePart::Literal(text)) => text,
            _ => "",
        }
    }

    /// Column names referenced by the template, in placeholder order.
    pub fn references(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Placeholder(name) => Some(name.as_str()),
                TemplatePart::Literal(_) => None,
            })
            .collect()
    }

    /// Whether the template has at least one placeholder.
    pub fn has_placeholders(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Placeholder(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let t = Template::parse("http://example.org/item/{id}").unwrap();
        assert_eq!(
            t.parts(),
            &[
                TemplatePart::Literal("http://example.org/item/".to_string()),
                TemplatePart::Placeholder("id".to_string()),
            ]
        );
        assert_eq!(t.invariant_prefix(), "http://example.org/item/");
        assert_eq!(t.references(), vec!["id"]);
    }

    #[test]
    fn test_parse_multiple_placeholders() {
        let t = Template::parse("http://example.org/{ns}/{id}/tail").unwrap();
        assert_eq!(t.references(), vec!["ns", "id"]);
        assert_eq!(t.invariant_prefix(), "http://example.org/");
    }

    #[test]
    fn test_parse_leading_placeholder() {
        let t = Template::parse("{code}-suffix").unwrap();
        assert_eq!(t.invariant_prefix(), "");
        assert!(t.has_placeholders());
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let t = Template::parse(r"http://example.org/\{x\}/{id}").unwrap();
        assert_eq!(t.invariant_prefix(), "http://example.org/{x}/");
        assert_eq!(t.references(), vec!["id"]);
    }

    #[test]
    fn test_escaped_brace_inside_placeholder_name() {
        let t = Template::parse(r"{a\}b}").unwrap();
        assert_eq!(t.references(), vec!["a}b"]);
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(Template::parse("http://example.org/{id").is_err());
        assert!(Template::parse("http://example.org/id}").is_err());
        assert!(Template::parse("{a{b}}").is_err());
    }

    #[test]
    fn test_empty_placeholder() {
        assert!(Template::parse("http://example.org/{}").is_err());
    }

    #[test]
    fn test_no_placeholders() {
        let t = Template::parse("http://example.org/fixed").unwrap();
        assert!(!t.has_placeholders());
        assert_eq!(t.invariant_prefix(), "http://example.org/fixed");
        assert!(t.references().is_empty());
    }
}
