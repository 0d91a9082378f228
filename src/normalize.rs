//! Rule table normalization
//!
//! Runs before partitioning and mutates rules in place:
//!
//! 1. **Termtype completion**: fills in the R2RML natural-typing defaults
//!    (subject → IRI; object → Literal when a language, datatype, or column
//!    reference forces it, else IRI).
//! 2. **Class expansion**: subjects with `rr:class` assertions gain one
//!    `rdf:type` rule per class.
//! 3. **Self-join elimination**: a parent join whose child and parent read
//!    the same logical source on identity columns is a no-op; the object term
//!    is rewritten to the parent's subject term map and the join cleared.
//!
//! Normalization is idempotent: a second run leaves the table unchanged.

use tracing::{debug, warn};

use crate::error::RmlResult;
use crate::model::{MappingRule, RuleTable, TermMap, TermType};
use crate::vocab::RDF;

/// Normalize the rule table in place.
pub fn normalize(table: &mut RuleTable) -> RmlResult<()> {
    complete_term_types(table);
    expand_classes(table);
    eliminate_self_joins(table)?;
    let dropped = table.drop_unproductive();
    if dropped > 0 {
        debug!(dropped, "dropped rules that cannot produce a triple");
    }
    Ok(())
}

/// Fill in missing term types per the R2RML natural-typing rules.
fn complete_term_types(table: &mut RuleTable) {
    for rule in table.rules_mut() {
        if rule.subject_termtype.is_none() {
            rule.subject_termtype = Some(TermType::Iri);
        }
        if rule.object_language.is_some() && rule.object_datatype.is_some() {
            warn!(
                triples_map = %rule.triples_map_id,
                "object has both a language tag and a datatype; language wins"
            );
            rule.object_datatype = None;
        }
        if rule.object.is_some() && rule.object_termtype.is_none() {
            let literal = rule.object_language.is_some()
                || rule.object_datatype.is_some()
                || matches!(rule.object, Some(TermMap::Reference(_)));
            rule.object_termtype = Some(if literal {
                TermType::Literal
            } else {
                TermType::Iri
            });
        }
    }
}

/// Expand subject classes into explicit `rdf:type` rules.
fn expand_classes(table: &mut RuleTable) {
    let mut class_rules: Vec<MappingRule> = Vec::new();
    for rule in table.rules_mut() {
        for class_iri in std::mem::take(&mut rule.subject_classes) {
            let mut type_rule = rule.clone();
            type_rule.predicate = Some(TermMap::constant(RDF::TYPE));
            type_rule.object = Some(TermMap::constant(class_iri));
            type_rule.object_termtype = Some(TermType::Iri);
            type_rule.object_datatype = None;
            type_rule.object_language = None;
            type_rule.computed_columns = Vec::new();
            class_rules.push(type_rule);
        }
    }
    if !class_rules.is_empty() {
        debug!(count = class_rules.len(), "expanded class assertions");
        table.extend(class_rules);
    }
}

/// Rewrite provably redundant self-joins into plain object terms.
///
/// Fails loudly when a parent id does not resolve; upstream validation
/// guarantees parent ids exist, so an unresolved id is a contract violation.
fn eliminate_self_joins(table: &mut RuleTable) -> RmlResult<()> {
    // Two passes: resolve parents against the immutable table, then apply.
    let mut rewrites: Vec<(usize, TermMap, Option<TermType>)> = Vec::new();

    for (idx, rule) in table.rules().iter().enumerate() {
        let Some((parent_id, conditions)) = rule.parent_join() else {
            continue;
        };
        let parent = table.rule_for_map(parent_id)?;

        let same_source = rule.source_name == parent.source_name
            && rule.logical_source == parent.logical_source;
        let identity_join = conditions.iter().all(|jc| jc.is_identity());

        if same_source && identity_join {
            rewrites.push((idx, parent.subject.clone(), parent.subject_termtype));
        }
    }

    if !rewrites.is_empty() {
        debug!(count = rewrites.len(), "eliminated redundant self-joins");
    }
    let rules = table.rules_mut();
    for (idx, object, termtype) in rewrites {
        rules[idx].object = Some(object);
        rules[idx].object_termtype = termtype.or(Some(TermType::Iri));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RmlError;
    use crate::model::{JoinCondition, LogicalSource};

    fn base_rule(id: &str, table_name: &str) -> MappingRule {
        MappingRule::new(
            "db",
            LogicalSource::Table(table_name.to_string()),
            id,
            TermMap::template(format!("http://example.org/{}/{{id}}", table_name)).unwrap(),
        )
    }

    fn table_of(rules: Vec<MappingRule>) -> RuleTable {
        RuleTable::new(rules).unwrap()
    }

    #[test]
    fn test_termtype_completion_defaults() {
        let rule = base_rule("#M", "people").with_predicate_object(
            TermMap::constant("http://example.org/name"),
            TermMap::reference("name"),
        );
        let mut table = table_of(vec![rule]);
        normalize(&mut table).unwrap();

        let rule = &table.rules()[0];
        assert_eq!(rule.subject_termtype, Some(TermType::Iri));
        assert_eq!(rule.object_termtype, Some(TermType::Literal));
    }

    #[test]
    fn test_termtype_template_object_defaults_to_iri() {
        let rule = base_rule("#M", "people").with_predicate_object(
            TermMap::constant("http://example.org/knows"),
            TermMap::template("http://example.org/person/{friend_id}").unwrap(),
        );
        let mut table = table_of(vec![rule]);
        normalize(&mut table).unwrap();
        assert_eq!(table.rules()[0].object_termtype, Some(TermType::Iri));
    }

    #[test]
    fn test_language_wins_over_datatype() {
        let rule = base_rule("#M", "people")
            .with_predicate_object(
                TermMap::constant("http://example.org/label"),
                TermMap::reference("label"),
            )
            .with_datatype("http://www.w3.org/2001/XMLSchema#string")
            .with_language("en");
        let mut table = table_of(vec![rule]);
        normalize(&mut table).unwrap();

        let rule = &table.rules()[0];
        assert_eq!(rule.object_language.as_deref(), Some("en"));
        assert_eq!(rule.object_datatype, None);
    }

    #[test]
    fn test_class_expansion() {
        let rule = base_rule("#M", "people").with_class("http://example.org/Person");
        let mut table = table_of(vec![rule]);
        normalize(&mut table).unwrap();

        // The bare original is dropped; the rdf:type rule remains.
        assert_eq!(table.len(), 1);
        let rule = &table.rules()[0];
        assert_eq!(
            rule.predicate,
            Some(TermMap::constant(RDF::TYPE))
        );
        assert_eq!(
            rule.object,
            Some(TermMap::constant("http://example.org/Person"))
        );
        assert_eq!(rule.object_termtype, Some(TermType::Iri));
    }

    #[test]
    fn test_self_join_elimination() {
        let parent = base_rule("#P", "people").with_predicate_object(
            TermMap::constant("http://example.org/name"),
            TermMap::reference("name"),
        );
        let child = base_rule("#C", "people").with_predicate_object(
            TermMap::constant("http://example.org/self"),
            TermMap::parent_join("#P", vec![JoinCondition::new("id", "id")]),
        );
        let mut table = table_of(vec![parent.clone(), child]);
        normalize(&mut table).unwrap();

        let rewritten = &table.rules()[1];
        assert_eq!(rewritten.object, Some(parent.subject.clone()));
        assert_eq!(rewritten.object_termtype, Some(TermType::Iri));
        assert!(rewritten.parent_join().is_none());
    }

    #[test]
    fn test_cross_table_join_kept() {
        let parent = base_rule("#P", "airlines").with_predicate_object(
            TermMap::constant("http://example.org/name"),
            TermMap::reference("name"),
        );
        let child = base_rule("#C", "routes").with_predicate_object(
            TermMap::constant("http://example.org/airline"),
            TermMap::parent_join("#P", vec![JoinCondition::new("airline_id", "id")]),
        );
        let mut table = table_of(vec![parent, child]);
        normalize(&mut table).unwrap();
        assert!(table.rules()[1].parent_join().is_some());
    }

    #[test]
    fn test_same_table_non_identity_join_kept() {
        let parent = base_rule("#P", "people").with_predicate_object(
            TermMap::constant("http://example.org/name"),
            TermMap::reference("name"),
        );
        let child = base_rule("#C", "people").with_predicate_object(
            TermMap::constant("http://example.org/manager"),
            TermMap::parent_join("#P", vec![JoinCondition::new("manager_id", "id")]),
        );
        let mut table = table_of(vec![parent, child]);
        normalize(&mut table).unwrap();
        assert!(table.rules()[1].parent_join().is_some());
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let child = base_rule("#C", "people").with_predicate_object(
            TermMap::constant("http://example.org/x"),
            TermMap::parent_join("#Missing", vec![JoinCondition::new("id", "id")]),
        );
        let mut table = table_of(vec![child]);
        assert!(matches!(
            normalize(&mut table),
            Err(RmlError::UnknownTriplesMap(_))
        ));
    }

    #[test]
    fn test_normalize_idempotent() {
        let parent = base_rule("#P", "people")
            .with_class("http://example.org/Person")
            .with_predicate_object(
                TermMap::constant("http://example.org/name"),
                TermMap::reference("name"),
            );
        let child = base_rule("#C", "people").with_predicate_object(
            TermMap::constant("http://example.org/self"),
            TermMap::parent_join("#P", vec![JoinCondition::new("id", "id")]),
        );

        let mut once = table_of(vec![parent, child]);
        normalize(&mut once).unwrap();
        let mut twice = once.clone();
        normalize(&mut twice).unwrap();

        let fmt = |t: &RuleTable| format!("{:?}", t.rules());
        assert_eq!(fmt(&once), fmt(&twice));
    }
}
