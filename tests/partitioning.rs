//! Partitioning behavior across algorithms.

use proptest::prelude::*;

use rml_materializer::partition::assign_partition_keys;
use rml_materializer::pool::WorkerPool;
use rml_materializer::model::TemplatePart;
use rml_materializer::{
    LogicalSource, MappingRule, PartitioningAlgorithm, RuleTable, Template, TermMap, FALLBACK_KEY,
};

const SUBJECTS: &[&str] = &[
    "http://ex.org/person/{id}",
    "http://ex.org/person/detail/{id}",
    "http://ex.org/place/{id}",
    "http://ex.org/event/{id}",
];

const PREDICATES: &[&str] = &[
    "http://ex.org/name",
    "http://ex.org/age",
    "http://ex.org/location",
];

fn rule(subject: &str, predicate: &str) -> MappingRule {
    MappingRule::new(
        "db",
        LogicalSource::Table("t".to_string()),
        "#M",
        TermMap::template(subject).unwrap(),
    )
    .with_predicate_object(TermMap::constant(predicate), TermMap::reference("v"))
}

fn keys_for(rules: Vec<MappingRule>, algorithm: PartitioningAlgorithm) -> Vec<String> {
    let mut table = RuleTable::new(rules).unwrap();
    let pool = WorkerPool::new(2).unwrap();
    assign_partition_keys(&mut table, algorithm, &pool).unwrap();
    table
        .rules()
        .iter()
        .map(|r| r.partition_key.clone())
        .collect()
}

fn distinct(keys: &[String]) -> usize {
    let set: std::collections::HashSet<&String> = keys.iter().collect();
    set.len()
}

fn rule_set() -> impl Strategy<Value = Vec<MappingRule>> {
    prop::collection::vec(
        (0..SUBJECTS.len(), 0..PREDICATES.len()),
        1..20,
    )
    .prop_map(|picks| {
        picks
            .into_iter()
            .map(|(s, p)| rule(SUBJECTS[s], PREDICATES[p]))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_partial_keys_deterministic(rules in rule_set()) {
        let first = keys_for(rules.clone(), PartitioningAlgorithm::PartialAggregation);
        let second = keys_for(rules, PartitioningAlgorithm::PartialAggregation);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_maximal_keys_deterministic(rules in rule_set()) {
        let first = keys_for(rules.clone(), PartitioningAlgorithm::Maximal);
        let second = keys_for(rules, PartitioningAlgorithm::Maximal);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_maximal_at_least_as_fine_as_partial(rules in rule_set()) {
        let partial = keys_for(rules.clone(), PartitioningAlgorithm::PartialAggregation);
        let maximal = keys_for(rules, PartitioningAlgorithm::Maximal);
        prop_assert!(distinct(&maximal) >= distinct(&partial));
    }

    #[test]
    fn prop_fallback_key_unreachable(rules in rule_set()) {
        for algorithm in [
            PartitioningAlgorithm::PartialAggregation,
            PartitioningAlgorithm::Maximal,
        ] {
            let keys = keys_for(rules.clone(), algorithm);
            prop_assert!(keys.iter().all(|k| k != FALLBACK_KEY));
        }
    }

    #[test]
    fn prop_adding_rules_never_splits_groups(rules in rule_set(), extra in rule_set()) {
        // Partial aggregation can only merge groups as rules are added:
        // rules that shared a key keep sharing one in any larger table.
        let before = keys_for(rules.clone(), PartitioningAlgorithm::PartialAggregation);
        let mut grown = rules.clone();
        grown.extend(extra);
        let after = keys_for(grown, PartitioningAlgorithm::PartialAggregation);
        for i in 0..rules.len() {
            for j in (i + 1)..rules.len() {
                if before[i] == before[j] {
                    prop_assert_eq!(&after[i], &after[j]);
                }
            }
        }
    }

    #[test]
    fn prop_disjoint_rule_never_decreases_partitions(rules in rule_set()) {
        // A rule whose subject prefix and predicate overlap nothing in the
        // pool cannot merge existing groups.
        let before = keys_for(rules.clone(), PartitioningAlgorithm::PartialAggregation);
        let mut grown = rules;
        grown.push(rule("http://ex.org/region/{id}", "http://ex.org/altitude"));
        let after = keys_for(grown, PartitioningAlgorithm::PartialAggregation);
        prop_assert!(distinct(&after) >= distinct(&before));
    }

    #[test]
    fn prop_template_prefix_round_trip(
        prefix in "[a-z0-9:/._-]{0,24}",
        value in "[A-Za-z0-9]{1,12}",
    ) {
        let raw = format!("{prefix}{{v}}");
        let template = Template::parse(raw.clone()).unwrap();
        prop_assert_eq!(template.raw(), raw.as_str());
        prop_assert_eq!(template.invariant_prefix(), prefix.as_str());
        let rendered: String = template
            .parts()
            .iter()
            .map(|part| match part {
                TemplatePart::Literal(text) => text.as_str(),
                TemplatePart::Placeholder(_) => value.as_str(),
            })
            .collect();
        prop_assert_eq!(&rendered, &format!("{prefix}{value}"));
        prop_assert!(rendered.starts_with(template.invariant_prefix()));
    }

    #[test]
    fn prop_identical_rules_share_a_partition(rules in rule_set()) {
        let mut doubled = rules.clone();
        doubled.extend(rules.iter().cloned());
        let keys = keys_for(doubled, PartitioningAlgorithm::PartialAggregation);
        let n = rules.len();
        for i in 0..n {
            prop_assert_eq!(&keys[i], &keys[n + i]);
        }
    }
}

#[test]
fn test_prefix_compatible_subjects_grouped() {
    // person/ and person/detail/ overlap by prefix; place/ cannot.
    let keys = keys_for(
        vec![
            rule("http://ex.org/person/{id}", "http://ex.org/name"),
            rule("http://ex.org/person/detail/{id}", "http://ex.org/name"),
            rule("http://ex.org/place/{id}", "http://ex.org/name"),
        ],
        PartitioningAlgorithm::PartialAggregation,
    );
    assert_eq!(keys[0], keys[1]);
    assert_ne!(keys[0], keys[2]);
}

#[test]
fn test_distinct_predicates_split_partitions() {
    let keys = keys_for(
        vec![
            rule("http://ex.org/person/{id}", "http://ex.org/name"),
            rule("http://ex.org/person/{id}", "http://ex.org/age"),
        ],
        PartitioningAlgorithm::PartialAggregation,
    );
    assert_ne!(keys[0], keys[1]);
}

#[test]
fn test_reference_subject_absorbs_position() {
    // A subject with no invariant shares a group with every other subject.
    let mut open = rule("http://ex.org/person/{id}", "http://ex.org/name");
    open.subject = TermMap::reference("iri_col");
    let keys = keys_for(
        vec![
            open,
            rule("http://ex.org/person/{id}", "http://ex.org/name"),
            rule("http://ex.org/place/{id}", "http://ex.org/name"),
        ],
        PartitioningAlgorithm::PartialAggregation,
    );
    assert_eq!(keys[0], keys[1]);
    assert_eq!(keys[1], keys[2]);
}

#[test]
fn test_literal_buckets_split_by_language_and_datatype() {
    let base = || rule("http://ex.org/person/{id}", "http://ex.org/name");
    let keys = keys_for(
        vec![
            base().with_language("en"),
            base().with_language("fr"),
            base().with_datatype("http://www.w3.org/2001/XMLSchema#integer"),
        ],
        PartitioningAlgorithm::PartialAggregation,
    );
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[0], keys[2]);
    assert_ne!(keys[1], keys[2]);
}

#[test]
fn test_maximal_beats_partial_on_interleaved_invariants() {
    // Flat per-position grouping merges the middle subjects; refining
    // within predicate clusters keeps them apart.
    let rules = vec![
        rule("http://ex.org/a/{id}", "http://ex.org/p1"),
        rule("http://ex.org/a/b/{id}", "http://ex.org/p2"),
        rule("http://ex.org/a/c/{id}", "http://ex.org/p1"),
    ];
    let partial = keys_for(rules.clone(), PartitioningAlgorithm::PartialAggregation);
    let maximal = keys_for(rules, PartitioningAlgorithm::Maximal);
    assert!(distinct(&maximal) >= distinct(&partial));
}
