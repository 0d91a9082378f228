//! The normalized rule table
//!
//! Holds every mapping rule of a run and enforces the structural contracts
//! the rest of the pipeline assumes: subjects are present by construction,
//! join conditions appear exactly on parent-join terms, and a triples map id
//! never spans two sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::rule::{MappingRule, TermMap};
use crate::error::{RmlError, RmlResult};

/// The in-memory table of mapping rules for one materialization run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<MappingRule>,
}

impl RuleTable {
    /// Build a rule table, validating structural invariants.
    ///
    /// Fails when a triples map id appears under more than one source, or a
    /// parent-join term carries no join conditions.
    pub fn new(rules: Vec<MappingRule>) -> RmlResult<Self> {
        let mut id_source: HashMap<&str, &str> = HashMap::new();
        for rule in &rules {
            match id_source.insert(&rule.triples_map_id, &rule.source_name) {
                Some(existing) if existing != rule.source_name => {
                    return Err(RmlError::InvalidRuleTable(format!(
                        "triples map id '{}' appears under sources '{}' and '{}'",
                        rule.triples_map_id, existing, rule.source_name
                    )));
                }
                _ => {}
            }
            for term in [Some(&rule.subject), rule.object.as_ref()].into_iter().flatten() {
                if let TermMap::ParentJoin { parent, conditions } = term {
                    if conditions.is_empty() {
                        return Err(RmlError::InvalidRuleTable(format!(
                            "parent join to '{}' in '{}' has no join conditions",
                            parent, rule.triples_map_id
                        )));
                    }
                }
            }
        }
        Ok(Self { rules })
    }

    /// All rules, in table order
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Mutable access for the normalizer and partitioner
    pub fn rules_mut(&mut self) -> &mut [MappingRule] {
        &mut self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up the first rule of a triples map by id.
    ///
    /// All rules of a triples map share the same subject and logical source,
    /// so the first match is authoritative for parent-join resolution.
    pub fn rule_for_map(&self, triples_map_id: &str) -> RmlResult<&MappingRule> {
        self.rules
            .iter()
            .find(|r| r.triples_map_id == triples_map_id)
            .ok_or_else(|| RmlError::UnknownTriplesMap(triples_map_id.to_string()))
    }

    /// Drop rules that cannot produce a triple (no predicate/object and no
    /// class-derived predicate). Returns the number of rules dropped.
    pub fn drop_unproductive(&mut self) -> usize {
        let before = self.rules.len();
        self.rules.retain(|r| r.is_productive());
        before - self.rules.len()
    }

    /// Append additional rules (used by the normalizer's class expansion)
    pub(crate) fn extend(&mut self, rules: impl IntoIterator<Item = MappingRule>) {
        self.rules.extend(rules);
    }

    /// Group rule indices by partition key, in first-seen key order.
    ///
    /// Only meaningful after the partitioner has run.
    pub fn partitions(&self) -> Vec<(String, Vec<usize>)> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            if !groups.contains_key(&rule.partition_key) {
                order.push(rule.partition_key.clone());
            }
            groups.entry(rule.partition_key.clone()).or_default().push(idx);
        }
        order
            .into_iter()
            .map(|key| {
                let members = groups.remove(&key).unwrap_or_default();
                (key, members)
            })
            .collect()
    }
}
