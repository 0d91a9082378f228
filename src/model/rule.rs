//! Mapping rule structures
//!
//! A [`MappingRule`] is one row of the normalized rule table: one
//! (subject, predicate-object, graph) combination of a triples map, with a
//! term map per quad position. Rule rows are produced by the upstream
//! mapping-document parser, mutated in place by the normalizer, annotated by
//! the partitioner, and read-only during materialization.

use serde::{Deserialize, Serialize};

use super::function::FunctionCall;
use super::template::Template;
use crate::vocab::R2RML;

/// RDF term type
///
/// Specifies whether a term map generates IRIs, blank nodes, or literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TermType {
    /// Generate an IRI (default for subject, predicate, and graph maps)
    #[default]
    Iri,
    /// Generate a blank node
    BlankNode,
    /// Generate a literal (only valid for object maps)
    Literal,
}

impl TermType {
    /// Parse term type from its R2RML IRI
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            R2RML::IRI => Some(TermType::Iri),
            R2RML::BLANK_NODE => Some(TermType::BlankNode),
            R2RML::LITERAL => Some(TermType::Literal),
            _ => None,
        }
    }

    /// Check if this term type produces IRIs
    pub fn is_iri(&self) -> bool {
        matches!(self, TermType::Iri)
    }

    /// Check if this term type produces blank nodes
    pub fn is_blank_node(&self) -> bool {
        matches!(self, TermType::BlankNode)
    }

    /// Check if this term type produces literals
    pub fn is_literal(&self) -> bool {
        matches!(self, TermType::Literal)
    }
}

/// Quad position a term map occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl Position {
    /// All four positions in subject-predicate-object-graph order.
    pub const ALL: [Position; 4] = [
        Position::Subject,
        Position::Predicate,
        Position::Object,
        Position::Graph,
    ];
}

/// A single join condition of a parent-join term map
///
/// The child column in the referencing rule's logical source must equal the
/// parent column in the parent triples map's logical source. Carried as a
/// typed pair end to end; never serialized to an intermediate string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Column in the referencing (child) rule's logical source
    pub child: String,
    /// Column in the parent triples map's logical source
    pub parent: String,
}

impl JoinCondition {
    /// Create a new join condition
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }

    /// Whether child and parent name the same column
    pub fn is_identity(&self) -> bool {
        self.child == self.parent
    }
}

/// The logical source a rule reads rows from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalSource {
    /// A base table or view in a relational source
    Table(String),
    /// A raw query against a relational source
    Query(String),
    /// A file-backed source, with an optional iterator expression for
    /// hierarchical formats
    File {
        path: String,
        iterator: Option<String>,
    },
    /// An in-memory table registered under a handle name
    InMemory(String),
}

impl LogicalSource {
    /// The table name, when this source is a plain table reference
    pub fn table_name(&self) -> Option<&str> {
        match self {
            LogicalSource::Table(name) => Some(name),
            _ => None,
        }
    }

    /// The raw query text, when this source is a query
    pub fn query_text(&self) -> Option<&str> {
        match self {
            LogicalSource::Query(sql) => Some(sql),
            _ => None,
        }
    }

    /// Whether this source is a plain relational table reference
    pub fn is_table(&self) -> bool {
        matches!(self, LogicalSource::Table(_))
    }
}

/// A term map: the specification for deriving one RDF term per row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermMap {
    /// A constant value, identical for every row
    Constant(String),
    /// A template interleaving literal text and column placeholders
    Template(Template),
    /// A direct column reference
    Reference(String),
    /// A reference to the subject of another triples map, resolved by join.
    /// Only valid in the subject and object positions.
    ParentJoin {
        /// Id of the parent triples map
        parent: String,
        /// Ordered child/parent column pairs; never empty
        conditions: Vec<JoinCondition>,
    },
}

impl TermMap {
    /// Create a constant term map
    pub fn constant(value: impl Into<String>) -> Self {
        TermMap::Constant(value.into())
    }

    /// Create a template term map, parsing the template text
    pub fn template(raw: impl Into<String>) -> crate::error::RmlResult<Self> {
        Ok(TermMap::Template(Template::parse(raw)?))
    }

    /// Create a column reference term map
    pub fn reference(column: impl Into<String>) -> Self {
        TermMap::Reference(column.into())
    }

    /// Create a parent-join term map
    pub fn parent_join(parent: impl Into<String>, conditions: Vec<JoinCondition>) -> Self {
        TermMap::ParentJoin {
            parent: parent.into(),
            conditions,
        }
    }

    /// The data-independent invariant of this term map's output.
    ///
    /// `Constant` terms always produce exactly their value; `Template` terms
    /// always produce values starting with the template's literal prefix.
    /// `Reference` and unresolved `ParentJoin` terms can produce anything, so
    /// they have no invariant.
    pub fn invariant(&self) -> Option<&str> {
        match self {
            TermMap::Constant(value) => Some(value),
            TermMap::Template(template) => Some(template.invariant_prefix()),
            TermMap::Reference(_) | TermMap::ParentJoin { .. } => None,
        }
    }

    /// Whether this is a constant term map
    pub fn is_constant(&self) -> bool {
        matches!(self, TermMap::Constant(_))
    }

    /// Whether this is a parent-join term map
    pub fn is_parent_join(&self) -> bool {
        matches!(self, TermMap::ParentJoin { .. })
    }

    /// Source columns this term map reads.
    ///
    /// For parent joins these are the child-side join columns; the parent
    /// side is fetched separately during join resolution.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            TermMap::Constant(_) => vec![],
            TermMap::Template(template) => template.references(),
            TermMap::Reference(column) => vec![column.as_str()],
            TermMap::ParentJoin { conditions, .. } => {
                conditions.iter().map(|jc| jc.child.as_str()).collect()
            }
        }
    }
}

/// One row of the normalized rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    /// Name of the data source this rule reads from
    pub source_name: String,
    /// The logical source (table, query, file, or in-memory handle)
    pub logical_source: LogicalSource,
    /// Id of the triples map this rule belongs to. Shared by all rules of
    /// one triples map; must not recur under a different source.
    pub triples_map_id: String,

    /// Subject term map (always present)
    pub subject: TermMap,
    /// Subject term type; `None` until the normalizer completes it
    pub subject_termtype: Option<TermType>,
    /// Classes asserted for the subject; expanded by the normalizer into
    /// `rdf:type` rules
    pub subject_classes: Vec<String>,

    /// Predicate term map
    pub predicate: Option<TermMap>,
    /// Object term map
    pub object: Option<TermMap>,
    /// Object term type; `None` until the normalizer completes it
    pub object_termtype: Option<TermType>,
    /// Explicit datatype IRI for literal objects
    pub object_datatype: Option<String>,
    /// Language tag for literal objects; wins over `object_datatype` when
    /// both are given
    pub object_language: Option<String>,

    /// Graph term map; `None` means the default graph
    pub graph: Option<TermMap>,

    /// Computed columns added to fetched chunks before rendering, via the
    /// function-execution collaborator
    pub computed_columns: Vec<ComputedColumn>,

    /// Whether the triples map is asserted. Non-asserted maps (RDF-star
    /// annotation sources) fall back to the fixed partition key.
    pub asserted: bool,

    /// Partition key assigned by the partitioner; empty until then and
    /// stable for the rest of the run
    pub partition_key: String,
}

/// An extra column computed per fetched row by the function collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedColumn {
    /// Name the column is registered under; term maps reference it like any
    /// source column
    pub name: String,
    /// The function call producing the value
    pub call: FunctionCall,
}

impl MappingRule {
    /// Create a rule with a subject term map and defaults everywhere else.
    pub fn new(
        source_name: impl Into<String>,
        logical_source: LogicalSource,
        triples_map_id: impl Into<String>,
        subject: TermMap,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            logical_source,
            triples_map_id: triples_map_id.into(),
            subject,
            subject_termtype: None,
            subject_classes: Vec::new(),
            predicate: None,
            object: None,
            object_termtype: None,
            object_datatype: None,
            object_language: None,
            graph: None,
            computed_columns: Vec::new(),
            asserted: true,
            partition_key: String::new(),
        }
    }

    /// Set the predicate and object term maps
    pub fn with_predicate_object(mut self, predicate: TermMap, object: TermMap) -> Self {
        self.predicate = Some(predicate);
        self.object = Some(object);
        self
    }

    /// Set the graph term map
    pub fn with_graph(mut self, graph: TermMap) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Add a subject class
    pub fn with_class(mut self, class_iri: impl Into<String>) -> Self {
        self.subject_classes.push(class_iri.into());
        self
    }

    /// Set the object datatype
    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.object_datatype = Some(datatype.into());
        self
    }

    /// Set the object language tag
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.object_language = Some(language.into());
        self
    }

    /// The term map at a quad position
    pub fn term(&self, position: Position) -> Option<&TermMap> {
        match position {
            Position::Subject => Some(&self.subject),
            Position::Predicate => self.predicate.as_ref(),
            Position::Object => self.object.as_ref(),
            Position::Graph => self.graph.as_ref(),
        }
    }

    /// The effective term type at a quad position.
    ///
    /// Predicates and graphs are always IRIs. Subject and object fall back
    /// to the R2RML defaults when the normalizer has not run yet.
    pub fn termtype(&self, position: Position) -> TermType {
        match position {
            Position::Subject => self.subject_termtype.unwrap_or(TermType::Iri),
            Position::Object => self.object_termtype.unwrap_or_else(|| {
                if self.object_language.is_some()
                    || self.object_datatype.is_some()
                    || matches!(self.object, Some(TermMap::Reference(_)))
                {
                    TermType::Literal
                } else {
                    TermType::Iri
                }
            }),
            Position::Predicate | Position::Graph => TermType::Iri,
        }
    }

    /// Whether this rule can produce any triple at all.
    ///
    /// Rules with neither a predicate/object pair nor a class are dropped
    /// before partitioning.
    pub fn is_productive(&self) -> bool {
        (self.predicate.is_some() && self.object.is_some()) || !self.subject_classes.is_empty()
    }

    /// The object's parent-join specification, if any
    pub fn parent_join(&self) -> Option<(&str, &[JoinCondition])> {
        match &self.object {
            Some(TermMap::ParentJoin { parent, conditions }) => {
                Some((parent.as_str(), conditions.as_slice()))
            }
            _ => None,
        }
    }

    /// Names of the computed columns this rule adds before rendering
    pub fn computed_column_names(&self) -> Vec<&str> {
        self.computed_columns
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Source columns needed to materialize this rule, across all four
    /// positions and function inputs. Computed-column names are excluded;
    /// their input references are included instead.
    pub fn needed_columns(&self) -> Vec<String> {
        let computed: Vec<&str> = self.computed_column_names();
        let mut needed: Vec<String> = Vec::new();
        let mut push = |col: &str| {
            if !computed.contains(&col) && !needed.iter().any(|c| c == col) {
                needed.push(col.to_string());
            }
        };
        for position in Position::ALL {
            if let Some(term) = self.term(position) {
                for col in term.referenced_columns() {
                    push(col);
                }
            }
        }
        for computed_col in &self.computed_columns {
            for col in computed_col.call.referenced_columns() {
                push(col);
            }
        }
        needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule() -> MappingRule {
        MappingRule::new(
            "db",
            LogicalSource::Table("people".to_string()),
            "#PersonMapping",
            TermMap::template("http://example.org/person/{id}").unwrap(),
        )
        .with_predicate_object(
            TermMap::constant("http://example.org/name"),
            TermMap::reference("name"),
        )
    }

    #[test]
    fn test_term_type_from_iri() {
        assert_eq!(
            TermType::from_iri("http://www.w3.org/ns/r2rml#IRI"),
            Some(TermType::Iri)
        );
        assert_eq!(
            TermType::from_iri("http://www.w3.org/ns/r2rml#Literal"),
            Some(TermType::Literal)
        );
        assert_eq!(TermType::from_iri("invalid"), None);
    }

    #[test]
    fn test_invariants() {
        let constant = TermMap::constant("http://example.org/p");
        assert_eq!(constant.invariant(), Some("http://example.org/p"));

        let template = TermMap::template("http://example.org/{id}").unwrap();
        assert_eq!(template.invariant(), Some("http://example.org/"));

        let reference = TermMap::reference("col");
        assert_eq!(reference.invariant(), None);

        let join = TermMap::parent_join("#Parent", vec![JoinCondition::new("a", "b")]);
        assert_eq!(join.invariant(), None);
    }

    #[test]
    fn test_needed_columns() {
        let rule = sample_rule();
        assert_eq!(rule.needed_columns(), vec!["id", "name"]);
    }

    #[test]
    fn test_needed_columns_join() {
        let mut rule = sample_rule();
        rule.object = Some(TermMap::parent_join(
            "#Other",
            vec![JoinCondition::new("other_id", "id")],
        ));
        assert_eq!(rule.needed_columns(), vec!["id", "other_id"]);
    }

    #[test]
    fn test_default_termtypes() {
        let rule = sample_rule();
        assert_eq!(rule.termtype(Position::Subject), TermType::Iri);
        assert_eq!(rule.termtype(Position::Predicate), TermType::Iri);
        // Reference-valued object defaults to Literal (natural typing)
        assert_eq!(rule.termtype(Position::Object), TermType::Literal);
    }

    #[test]
    fn test_productive() {
        let rule = sample_rule();
        assert!(rule.is_productive());

        let bare = MappingRule::new(
            "db",
            LogicalSource::Table("people".to_string()),
            "#Bare",
            TermMap::template("http://example.org/{id}").unwrap(),
        );
        assert!(!bare.is_productive());

        let classed = bare.with_class("http://example.org/Person");
        assert!(classed.is_productive());
    }
}
