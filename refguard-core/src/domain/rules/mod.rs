// refguard-core/src/domain/rules/mod.rs

pub mod definition;
pub mod resolver;

pub use definition::{RuleDefinition, RuleKey, RuleLevel, parse_rule_file};
pub use resolver::{LayeredRules, OrderedRuleMap, ResolvedRuleSet, RuleProvenance, RuleResolver};
