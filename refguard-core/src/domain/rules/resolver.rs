// refguard-core/src/domain/rules/resolver.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::rules::definition::{RuleDefinition, RuleKey, RuleLevel};

/// The five raw rule lists for one (product type, exchange[, custom]) request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayeredRules {
    levels: [Vec<RuleDefinition>; 5],
}

impl LayeredRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: RuleLevel, rules: Vec<RuleDefinition>) -> Self {
        self.set(level, rules);
        self
    }

    pub fn set(&mut self, level: RuleLevel, rules: Vec<RuleDefinition>) {
        self.levels[level.index()] = rules;
    }

    pub fn level(&self, level: RuleLevel) -> &[RuleDefinition] {
        &self.levels[level.index()]
    }

    /// Levels in application order (1 -> 5).
    pub fn iter(&self) -> impl Iterator<Item = (RuleLevel, &[RuleDefinition])> {
        RuleLevel::ALL
            .into_iter()
            .map(move |level| (level, self.level(level)))
    }

    pub fn total_rules(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Where the parameters of a resolved rule came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleProvenance {
    #[serde(rename = "RuleName")]
    pub rule_name: String,
    #[serde(rename = "RuleType")]
    pub rule_type: String,
    #[serde(rename = "RuleLevel")]
    pub rule_level: RuleLevel,
    #[serde(rename = "RuleSource")]
    pub rule_source: String,
}

impl RuleProvenance {
    fn of(rule: &RuleDefinition) -> Self {
        Self {
            rule_name: rule.rule_name(),
            rule_type: rule.rule_type.clone(),
            rule_level: rule.level,
            rule_source: rule.source_path.clone(),
        }
    }
}

/// Insertion-ordered map keyed by (column, type).
/// Overwriting a key keeps the slot of its first insertion.
#[derive(Debug, Default)]
pub struct OrderedRuleMap {
    entries: Vec<RuleDefinition>,
    index: HashMap<RuleKey, usize>,
}

impl OrderedRuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the key was new, `false` when an existing entry was overridden.
    pub fn upsert(&mut self, rule: RuleDefinition) -> bool {
        let key = rule.key();
        match self.index.get(&key) {
            Some(&slot) => {
                self.entries[slot] = rule;
                false
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(rule);
                true
            }
        }
    }

    pub fn get(&self, key: &RuleKey) -> Option<&RuleDefinition> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_values(self) -> Vec<RuleDefinition> {
        self.entries
    }
}

/// Final, deduplicated rule list plus a parallel provenance list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRuleSet {
    pub rules: Vec<RuleDefinition>,
    pub provenance: Vec<RuleProvenance>,
}

impl ResolvedRuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleDefinition, &RuleProvenance)> {
        self.rules.iter().zip(self.provenance.iter())
    }

    pub fn find(&self, column: &str, rule_type: &str) -> Option<&RuleDefinition> {
        self.rules
            .iter()
            .find(|r| r.column == column && r.rule_type == rule_type)
    }
}

pub struct RuleResolver;

impl RuleResolver {
    /// Merges the five levels into one rule set.
    ///
    /// Levels are applied 1 -> 5 and, inside a level, in list order. A key seen again
    /// replaces the stored definition but keeps the evaluation slot of its first appearance.
    pub fn resolve(layers: &LayeredRules) -> ResolvedRuleSet {
        let mut map = OrderedRuleMap::new();

        for (level, rules) in layers.iter() {
            for rule in rules {
                let mut rule = rule.clone();
                // The list a rule came from is authoritative for its level.
                rule.level = level;
                map.upsert(rule);
            }
        }

        let rules = map.into_values();
        let provenance = rules.iter().map(RuleProvenance::of).collect();

        ResolvedRuleSet { rules, provenance }
    }
}
