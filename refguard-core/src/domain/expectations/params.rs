// refguard-core/src/domain/expectations/params.rs
//
// Typed access to the free-form parameter map of a rule definition.

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::dataset::{as_number, canonical_text};
use crate::domain::expectations::RuleEvaluationError;
use crate::domain::rules::RuleDefinition;

fn invalid(param: &str, reason: impl Into<String>) -> RuleEvaluationError {
    RuleEvaluationError::InvalidParameter {
        param: param.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn required_str(
    rule: &RuleDefinition,
    key: &str,
) -> Result<String, RuleEvaluationError> {
    match rule.param(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(invalid(key, "must not be empty")),
        Some(other) => Err(invalid(key, format!("expected a string, got {}", other))),
        None => Err(invalid(key, "is required")),
    }
}

pub(crate) fn optional_number(
    rule: &RuleDefinition,
    key: &str,
) -> Result<Option<f64>, RuleEvaluationError> {
    match rule.param(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_number(value)
            .map(Some)
            .ok_or_else(|| invalid(key, format!("expected a number, got {}", value))),
    }
}

pub(crate) fn flag(rule: &RuleDefinition, key: &str) -> Result<bool, RuleEvaluationError> {
    match rule.param(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(invalid(key, format!("expected true/false, got {}", other))),
    }
}

/// `value_set` as canonical texts.
pub(crate) fn value_set(rule: &RuleDefinition) -> Result<HashSet<String>, RuleEvaluationError> {
    match rule.param("value_set") {
        Some(Value::Array(items)) => Ok(items.iter().map(canonical_text).collect()),
        Some(other) => Err(invalid(
            "value_set",
            format!("expected a list, got {}", other),
        )),
        None => Err(invalid("value_set", "is required")),
    }
}

/// Fraction of rows that must pass, 1.0 when absent.
pub(crate) fn mostly(rule: &RuleDefinition) -> Result<f64, RuleEvaluationError> {
    match optional_number(rule, "mostly")? {
        None => Ok(1.0),
        Some(m) if (0.0..=1.0).contains(&m) => Ok(m),
        Some(m) => Err(invalid("mostly", format!("must be within [0, 1], got {}", m))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rules::RuleLevel;

    fn rule() -> RuleDefinition {
        RuleDefinition::new(RuleLevel::Global, "between", "Price", "base.yaml")
    }

    #[test]
    fn test_numbers_accept_numeric_text() {
        let r = rule().with_param("min_value", "0.5").with_param("max_value", 10);
        assert_eq!(optional_number(&r, "min_value").unwrap(), Some(0.5));
        assert_eq!(optional_number(&r, "max_value").unwrap(), Some(10.0));
        assert_eq!(optional_number(&r, "absent").unwrap(), None);
        assert!(optional_number(&rule().with_param("min_value", "low"), "min_value").is_err());
    }

    #[test]
    fn test_mostly_bounds() {
        assert_eq!(mostly(&rule()).unwrap(), 1.0);
        assert_eq!(mostly(&rule().with_param("mostly", 0.95)).unwrap(), 0.95);
        assert!(mostly(&rule().with_param("mostly", 1.5)).is_err());
    }

    #[test]
    fn test_value_set_is_canonical() {
        let r = rule().with_param("value_set", serde_json::json!([1, "HKD", 2.0]));
        let set = value_set(&r).unwrap();
        assert!(set.contains("1") && set.contains("HKD") && set.contains("2"));
        assert!(value_set(&rule().with_param("value_set", "HKD")).is_err());
    }

    #[test]
    fn test_required_str() {
        assert!(required_str(&rule(), "regex").is_err());
        assert!(required_str(&rule().with_param("regex", ""), "regex").is_err());
        assert_eq!(required_str(&rule().with_param("regex", "^A"), "regex").unwrap(), "^A");
    }
}
