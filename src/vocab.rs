//! Vocabulary constants used during materialization
//!
//! Only the IRIs the engine itself consumes live here: term-type markers,
//! the default-graph sentinel, and the RDF/XSD datatypes produced by the
//! term renderer and the datatype-inference table.

/// R2RML vocabulary constants
pub struct R2RML;

impl R2RML {
    /// R2RML namespace IRI
    pub const NS: &'static str = "http://www.w3.org/ns/r2rml#";

    /// rr:IRI - Term type for IRIs
    pub const IRI: &'static str = "http://www.w3.org/ns/r2rml#IRI";

    /// rr:BlankNode - Term type for blank nodes
    pub const BLANK_NODE: &'static str = "http://www.w3.org/ns/r2rml#BlankNode";

    /// rr:Literal - Term type for literals
    pub const LITERAL: &'static str = "http://www.w3.org/ns/r2rml#Literal";

    /// rr:defaultGraph - Sentinel graph IRI meaning "the unnamed default graph"
    ///
    /// Graph terms equal to this IRI are omitted from quad output unless
    /// default-graph materialization is explicitly configured.
    pub const DEFAULT_GRAPH: &'static str = "http://www.w3.org/ns/r2rml#defaultGraph";
}

/// RDF vocabulary constants
pub struct RDF;

impl RDF {
    /// RDF namespace IRI
    pub const NS: &'static str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    /// rdf:type
    pub const TYPE: &'static str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    /// rdf:langString - implicit datatype of language-tagged literals
    pub const LANG_STRING: &'static str =
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

/// XSD datatype constants
pub struct XSD;

impl XSD {
    /// XSD namespace IRI
    pub const NS: &'static str = "http://www.w3.org/2001/XMLSchema#";

    /// xsd:string
    pub const STRING: &'static str = "http://www.w3.org/2001/XMLSchema#string";

    /// xsd:boolean
    pub const BOOLEAN: &'static str = "http://www.w3.org/2001/XMLSchema#boolean";

    /// xsd:integer
    pub const INTEGER: &'static str = "http://www.w3.org/2001/XMLSchema#integer";

    /// xsd:decimal
    pub const DECIMAL: &'static str = "http://www.w3.org/2001/XMLSchema#decimal";

    /// xsd:double
    pub const DOUBLE: &'static str = "http://www.w3.org/2001/XMLSchema#double";

    /// xsd:date
    pub const DATE: &'static str = "http://www.w3.org/2001/XMLSchema#date";

    /// xsd:dateTime
    pub const DATE_TIME: &'static str = "http://www.w3.org/2001/XMLSchema#dateTime";

    /// xsd:hexBinary
    pub const HEX_BINARY: &'static str = "http://www.w3.org/2001/XMLSchema#hexBinary";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces() {
        assert!(R2RML::IRI.starts_with(R2RML::NS));
        assert!(R2RML::DEFAULT_GRAPH.starts_with(R2RML::NS));
        assert!(XSD::INTEGER.starts_with(XSD::NS));
        assert!(RDF::LANG_STRING.starts_with(RDF::NS));
    }
}
