// refguard-core/src/ports/rule_store.rs

use crate::domain::error::DomainError;
use crate::domain::rules::{RuleDefinition, RuleLevel};

/// The (product type, exchange[, custom set]) a rule lookup is made for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleScope {
    pub product_type: String,
    pub exchange: String,
    pub custom_rules: Option<String>,
}

impl RuleScope {
    pub fn new(product_type: &str, exchange: &str, custom_rules: Option<&str>) -> Self {
        Self {
            product_type: product_type.to_string(),
            exchange: exchange.to_string(),
            custom_rules: custom_rules.map(str::to_string),
        }
    }
}

/// Hierarchical rule lookup.
pub trait RuleStore: Send + Sync {
    /// Rules of one level. An absent layer is an empty list, never an error.
    fn get(&self, level: RuleLevel, scope: &RuleScope)
    -> Result<Vec<RuleDefinition>, DomainError>;
}
