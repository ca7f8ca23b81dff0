// refguard-core/src/domain/rules/definition.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::DomainError;
use crate::domain::expectations::ExpectationKind;

/// The five layers of rule specialization, applied in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RuleLevel {
    Global = 1,
    ProductType = 2,
    Exchange = 3,
    ProductExchange = 4,
    Custom = 5,
}

impl RuleLevel {
    pub const ALL: [RuleLevel; 5] = [
        RuleLevel::Global,
        RuleLevel::ProductType,
        RuleLevel::Exchange,
        RuleLevel::ProductExchange,
        RuleLevel::Custom,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            RuleLevel::Global => "global",
            RuleLevel::ProductType => "product",
            RuleLevel::Exchange => "exchange",
            RuleLevel::ProductExchange => "product_exchange",
            RuleLevel::Custom => "custom",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

impl From<RuleLevel> for u8 {
    fn from(level: RuleLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for RuleLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RuleLevel::ALL
            .into_iter()
            .find(|l| l.as_u8() == value)
            .ok_or_else(|| format!("rule level must be between 1 and 5, got {}", value))
    }
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.label())
    }
}

/// Identity of a rule for merge purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub column: String,
    pub rule_type: String,
}

/// One data-quality rule as authored in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub level: RuleLevel,

    /// Canonical expectation name when the type is known, verbatim otherwise.
    #[serde(rename = "type")]
    pub rule_type: String,

    pub column: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Type-specific parameters (value_set, regex, min_value, ...).
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,

    /// Path of the rule file, relative to the rules directory.
    pub source_path: String,
}

impl RuleDefinition {
    pub fn new(level: RuleLevel, rule_type: &str, column: &str, source_path: &str) -> Self {
        Self {
            level,
            rule_type: ExpectationKind::canonical_type(rule_type),
            column: column.to_string(),
            name: None,
            description: None,
            parameters: BTreeMap::new(),
            source_path: source_path.to_string(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn key(&self) -> RuleKey {
        RuleKey {
            column: self.column.clone(),
            rule_type: self.rule_type.clone(),
        }
    }

    /// Display name: the authored `name`, or `{column}_{type}`.
    pub fn rule_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.column, self.rule_type))
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

// --- FILE FORMAT (DTOs) ---

#[derive(Debug, Deserialize, Default)]
struct RuleFile {
    #[serde(default)]
    rules: Option<Vec<RawRule>>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "type", alias = "expectation_type", default)]
    rule_type: Option<String>,
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    parameters: BTreeMap<String, Value>,
}

/// Parses the content of one rule file into definitions tagged with `level`.
/// An empty document is an empty layer; a rule without `type` or `column` is fatal.
pub fn parse_rule_file(
    content: &str,
    level: RuleLevel,
    source_path: &str,
) -> Result<Vec<RuleDefinition>, DomainError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: RuleFile =
        serde_yaml::from_str(content).map_err(|e| DomainError::MalformedRuleFile {
            source_path: source_path.to_string(),
            reason: e.to_string(),
        })?;

    let raw_rules = file.rules.unwrap_or_default();
    let mut definitions = Vec::with_capacity(raw_rules.len());

    for (index, raw) in raw_rules.into_iter().enumerate() {
        let invalid = |reason: &str| DomainError::InvalidRule {
            source_path: source_path.to_string(),
            index,
            reason: reason.to_string(),
        };

        let rule_type = non_blank(raw.rule_type).ok_or_else(|| invalid("missing 'type'"))?;
        let column = non_blank(raw.column).ok_or_else(|| invalid("missing 'column'"))?;

        definitions.push(RuleDefinition {
            level,
            rule_type: ExpectationKind::canonical_type(&rule_type),
            column,
            name: raw.name,
            description: raw.description,
            parameters: raw.parameters,
            source_path: source_path.to_string(),
        });
    }

    Ok(definitions)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_file() {
        let yaml = r#"
rules:
  - type: not_null
    column: MasterId
  - type: expect_column_values_to_match_regex
    column: Symbol
    regex: "^[A-Z0-9]+$"
    description: Alphanumeric tickers
"#;
        let rules = parse_rule_file(yaml, RuleLevel::ProductType, "products/stock.yaml").unwrap();
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].rule_type, "expect_column_values_to_not_be_null");
        assert_eq!(rules[0].column, "MasterId");
        assert!(rules[0].parameters.is_empty());

        assert_eq!(rules[1].param("regex"), Some(&Value::from("^[A-Z0-9]+$")));
        assert_eq!(rules[1].description.as_deref(), Some("Alphanumeric tickers"));
        assert_eq!(rules[1].level, RuleLevel::ProductType);
        assert_eq!(rules[1].source_path, "products/stock.yaml");
    }

    #[test]
    fn test_empty_documents_are_empty_layers() {
        assert!(parse_rule_file("", RuleLevel::Global, "base.yaml").unwrap().is_empty());
        assert!(parse_rule_file("rules:\n", RuleLevel::Global, "base.yaml").unwrap().is_empty());
    }

    #[test]
    fn test_missing_type_is_fatal() {
        let yaml = "rules:\n  - column: Symbol\n";
        let err = parse_rule_file(yaml, RuleLevel::Exchange, "exchanges/HKEX.yaml").unwrap_err();
        match err {
            DomainError::InvalidRule {
                source_path,
                index,
                reason,
            } => {
                assert_eq!(source_path, "exchanges/HKEX.yaml");
                assert_eq!(index, 0);
                assert!(reason.contains("type"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_column_is_fatal() {
        let yaml = "rules:\n  - type: unique\n    column: '  '\n";
        let err = parse_rule_file(yaml, RuleLevel::Global, "base.yaml").unwrap_err();
        assert!(matches!(err, DomainError::InvalidRule { .. }));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let err = parse_rule_file("rules: [", RuleLevel::Global, "base.yaml").unwrap_err();
        assert!(matches!(err, DomainError::MalformedRuleFile { .. }));
    }

    #[test]
    fn test_unknown_types_are_kept_verbatim() {
        let yaml = "rules:\n  - type: expect_table_row_count_to_equal\n    column: '*'\n";
        let rules = parse_rule_file(yaml, RuleLevel::Custom, "custom/x.yaml").unwrap();
        assert_eq!(rules[0].rule_type, "expect_table_row_count_to_equal");
    }

    #[test]
    fn test_level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&RuleLevel::ProductExchange).unwrap(), "4");
        let level: RuleLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level, RuleLevel::ProductType);
        assert!(serde_json::from_str::<RuleLevel>("9").is_err());
    }

    #[test]
    fn test_rule_name_defaults_to_column_and_type() {
        let rule = RuleDefinition::new(RuleLevel::Global, "unique", "MasterId", "base.yaml");
        assert_eq!(rule.rule_name(), "MasterId_expect_column_values_to_be_unique");
    }
}
