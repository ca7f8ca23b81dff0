// refguard-core/src/application/resolution.rs

use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::rules::{LayeredRules, ResolvedRuleSet, RuleLevel, RuleResolver};
use crate::ports::rule_store::{RuleScope, RuleStore};

/// Fetches the five layers for a scope. A missing layer is an empty list.
pub fn load_layers(store: &dyn RuleStore, scope: &RuleScope) -> Result<LayeredRules, DomainError> {
    let mut layers = LayeredRules::new();
    for level in RuleLevel::ALL {
        let rules = store.get(level, scope)?;
        debug!(level = %level, rules = rules.len(), "Layer loaded");
        layers.set(level, rules);
    }
    Ok(layers)
}

/// Resolved rule set for (product type, exchange[, custom rule set]).
#[instrument(skip(store))]
pub fn resolve_rules(
    store: &dyn RuleStore,
    product_type: &str,
    exchange: &str,
    custom_rules: Option<&str>,
) -> Result<ResolvedRuleSet, DomainError> {
    let scope = RuleScope::new(product_type, exchange, custom_rules);
    let layers = load_layers(store, &scope)?;
    let resolved = RuleResolver::resolve(&layers);

    info!(
        loaded = layers.total_rules(),
        resolved = resolved.len(),
        "Rules resolved"
    );
    Ok(resolved)
}
