//! RDF term rendering
//!
//! Pure string rendering of constant/template/reference term maps into
//! escaped, encoded RDF term syntax. Placeholder values are percent-encoded
//! when the term is an IRI; literal values are quote/backslash-escaped at
//! serialization time so template fragments and referenced values are
//! treated uniformly.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::MaterializationConfig;
use crate::error::{RmlError, RmlResult};
use crate::model::{TemplatePart, TermMap, TermType};
use crate::source::RowChunk;

/// Characters percent-encoded inside IRI template values.
///
/// Unreserved characters, sub-delims, `:` and `@` pass through; everything
/// else (including space and non-ASCII) is encoded.
const IRI_VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// A rendered RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfTerm {
    /// An IRI
    Iri(String),
    /// A blank node with local identifier
    BlankNode(String),
    /// A literal with optional datatype and language
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl RdfTerm {
    /// Create an IRI term
    pub fn iri(iri: impl Into<String>) -> Self {
        RdfTerm::Iri(iri.into())
    }

    /// Create a blank node term
    pub fn blank_node(id: impl Into<String>) -> Self {
        RdfTerm::BlankNode(id.into())
    }

    /// Create a plain string literal
    pub fn string(value: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a typed literal
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged string
    pub fn lang_string(value: impl Into<String>, lang: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: None,
            language: Some(lang.into()),
        }
    }

    /// Whether this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, RdfTerm::Iri(_))
    }

    /// Whether this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, RdfTerm::Literal { .. })
    }

    /// Serialize to N-Triples term syntax.
    ///
    /// A literal carries `@lang` when a language is set, else `^^<datatype>`
    /// when a datatype is set, else nothing.
    pub fn to_ntriples(&self) -> String {
        match self {
            RdfTerm::Iri(iri) => format!("<{iri}>"),
            RdfTerm::BlankNode(id) => format!("_:{id}"),
            RdfTerm::Literal {
                value,
                datatype,
                language,
            } => {
                let escaped = escape_literal(value);
                match (language, datatype) {
                    (Some(lang), _) => format!("\"{escaped}\"@{lang}"),
                    (None, Some(dt)) => format!("\"{escaped}\"^^<{dt}>"),
                    (None, None) => format!("\"{escaped}\""),
                }
            }
        }
    }
}

/// Escape a literal value per N-Triples rules.
fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode a referenced value for use inside an IRI template.
fn encode_iri_value(value: &str, config: &MaterializationConfig) -> String {
    if config.only_printable {
        let printable: String = value.chars().filter(|c| !c.is_control()).collect();
        utf8_percent_encode(&printable, IRI_VALUE_SET).to_string()
    } else {
        utf8_percent_encode(value, IRI_VALUE_SET).to_string()
    }
}

/// One row of a fetched chunk, viewed through an optional column prefix
///
/// Join staging renames columns `child_*`/`parent_*`; the prefix lets term
/// maps keep referencing their original column names. Values matching the
/// configured null list read as null.
pub(crate) struct RowView<'a> {
    pub chunk: &'a RowChunk,
    pub row: usize,
    pub prefix: &'a str,
}

impl RowView<'_> {
    /// Resolve a column reference against this row.
    pub(crate) fn value(&self, column: &str, config: &MaterializationConfig) -> Option<String> {
        let name = if self.prefix.is_empty() {
            column.to_string()
        } else {
            format!("{}{column}", self.prefix)
        };
        let value = self.chunk.value(&name, self.row)?;
        if config.is_null_value(&value) {
            None
        } else {
            Some(value)
        }
    }
}

/// Render a term map against one row.
///
/// Returns `Ok(None)` when a needed reference is null: no triple is
/// generated for the row (null propagation). Parent-join terms must be
/// resolved to the parent's subject map before rendering; passing one here
/// is a programming error.
pub(crate) fn render_term(
    term: &TermMap,
    termtype: TermType,
    datatype: Option<&str>,
    language: Option<&str>,
    row: &RowView<'_>,
    config: &MaterializationConfig,
) -> RmlResult<Option<RdfTerm>> {
    let lexical = match term {
        TermMap::Constant(value) => value.clone(),
        TermMap::Reference(column) => match row.value(column, config) {
            Some(value) => value,
            None => return Ok(None),
        },
        TermMap::Template(template) => {
            let mut out = String::new();
            for part in template.parts() {
                match part {
                    TemplatePart::Literal(text) => out.push_str(text),
                    TemplatePart::Placeholder(column) => match row.value(column, config) {
                        Some(value) if termtype == TermType::Iri => {
                            out.push_str(&encode_iri_value(&value, config));
                        }
                        Some(value) => out.push_str(&value),
                        None => return Ok(None),
                    },
                }
            }
            out
        }
        TermMap::ParentJoin { parent, .. } => {
            return Err(RmlError::Materialization(format!(
                "unresolved parent join to '{parent}' reached the term renderer"
            )));
        }
    };

    let term = match termtype {
        TermType::Iri => RdfTerm::Iri(lexical),
        TermType::BlankNode => RdfTerm::BlankNode(lexical),
        TermType::Literal => RdfTerm::Literal {
            value: lexical,
            datatype: datatype.map(str::to_string),
            language: language.map(str::to_string),
        },
    };
    Ok(Some(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::XSD;

    fn config() -> MaterializationConfig {
        MaterializationConfig::default()
    }

    fn row_chunk() -> RowChunk {
        RowChunk::from_string_rows(
            &["id", "name", "note"],
            vec![vec![
                Some("42".to_string()),
                Some("hello world".to_string()),
                None,
            ]],
        )
        .unwrap()
    }

    fn view(chunk: &RowChunk) -> RowView<'_> {
        RowView {
            chunk,
            row: 0,
            prefix: "",
        }
    }

    #[test]
    fn test_render_template_iri() {
        let chunk = row_chunk();
        let term = TermMap::template("http://ex.org/item/{id}").unwrap();
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &config())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/item/42"));
        assert!(rendered.is_iri());
        assert_eq!(rendered.to_ntriples(), "<http://ex.org/item/42>");
    }

    #[test]
    fn test_template_value_percent_encoded() {
        let chunk = row_chunk();
        let term = TermMap::template("http://ex.org/{name}").unwrap();
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &config())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/hello%20world"));
    }

    #[test]
    fn test_template_fragments_not_encoded() {
        let chunk = row_chunk();
        // The '/' in the literal fragment survives; one in a value would not.
        let term = TermMap::template("http://ex.org/a/b/{id}").unwrap();
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &config())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/a/b/42"));
    }

    #[test]
    fn test_literal_template_not_percent_encoded() {
        let chunk = row_chunk();
        let term = TermMap::template("name: {name}").unwrap();
        let rendered = render_term(
            &term,
            TermType::Literal,
            None,
            None,
            &view(&chunk),
            &config(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(rendered.to_ntriples(), "\"name: hello world\"");
    }

    #[test]
    fn test_null_reference_propagates() {
        let chunk = row_chunk();
        let term = TermMap::reference("note");
        let rendered = render_term(
            &term,
            TermType::Literal,
            None,
            None,
            &view(&chunk),
            &config(),
        )
        .unwrap();
        assert_eq!(rendered, None);

        let templated = TermMap::template("http://ex.org/{note}").unwrap();
        let rendered = render_term(
            &templated,
            TermType::Iri,
            None,
            None,
            &view(&chunk),
            &config(),
        )
        .unwrap();
        assert_eq!(rendered, None);
    }

    #[test]
    fn test_configured_null_value_propagates() {
        let chunk = row_chunk();
        let cfg = MaterializationConfig {
            null_values: vec!["42".to_string()],
            ..Default::default()
        };
        let term = TermMap::reference("id");
        let rendered =
            render_term(&term, TermType::Literal, None, None, &view(&chunk), &cfg).unwrap();
        assert_eq!(rendered, None);
    }

    #[test]
    fn test_typed_literal() {
        let chunk = row_chunk();
        let term = TermMap::reference("id");
        let rendered = render_term(
            &term,
            TermType::Literal,
            Some(XSD::INTEGER),
            None,
            &view(&chunk),
            &config(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(rendered, RdfTerm::typed("42", XSD::INTEGER));
        assert!(rendered.is_literal());
        assert!(!rendered.is_iri());
        assert_eq!(
            rendered.to_ntriples(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn test_language_tagged_literal() {
        let chunk = row_chunk();
        let term = TermMap::reference("name");
        let rendered = render_term(
            &term,
            TermType::Literal,
            None,
            Some("en"),
            &view(&chunk),
            &config(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(rendered, RdfTerm::lang_string("hello world", "en"));
        assert_eq!(rendered.to_ntriples(), "\"hello world\"@en");
    }

    #[test]
    fn test_language_wins_in_serialization() {
        let term = RdfTerm::Literal {
            value: "bonjour".to_string(),
            datatype: Some(XSD::STRING.to_string()),
            language: Some("fr".to_string()),
        };
        assert_eq!(term.to_ntriples(), "\"bonjour\"@fr");
    }

    #[test]
    fn test_literal_escaping() {
        let term = RdfTerm::string("line1\nline2 \"quoted\" back\\slash\ttab");
        assert_eq!(
            term.to_ntriples(),
            "\"line1\\nline2 \\\"quoted\\\" back\\\\slash\\ttab\""
        );
    }

    #[test]
    fn test_blank_node() {
        let chunk = row_chunk();
        let term = TermMap::template("b{id}").unwrap();
        let rendered = render_term(
            &term,
            TermType::BlankNode,
            None,
            None,
            &view(&chunk),
            &config(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(rendered.to_ntriples(), "_:b42");
    }

    #[test]
    fn test_only_printable_strips_controls() {
        let chunk = RowChunk::from_string_rows(
            &["v"],
            vec![vec![Some("ab\u{0007}c".to_string())]],
        )
        .unwrap();
        let cfg = MaterializationConfig {
            only_printable: true,
            ..Default::default()
        };
        let term = TermMap::template("http://ex.org/{v}").unwrap();
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/abc"));
    }

    #[test]
    fn test_non_ascii_percent_encoded() {
        let chunk =
            RowChunk::from_string_rows(&["v"], vec![vec![Some("你好".to_string())]]).unwrap();
        let term = TermMap::template("http://ex.org/{v}").unwrap();
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &config())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/%E4%BD%A0%E5%A5%BD"));
    }

    #[test]
    fn test_constant_term() {
        let chunk = row_chunk();
        let term = TermMap::constant("http://ex.org/fixed");
        let rendered = render_term(&term, TermType::Iri, None, None, &view(&chunk), &config())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, RdfTerm::iri("http://ex.org/fixed"));
    }

    #[test]
    fn test_unresolved_parent_join_is_error() {
        let chunk = row_chunk();
        let term = TermMap::parent_join(
            "#P",
            vec![crate::model::JoinCondition::new("a", "b")],
        );
        assert!(render_term(&term, TermType::Iri, None, None, &view(&chunk), &config()).is_err());
    }
}
