// src/domain/project/configuration.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// One independent validation pass (region, product type, exchange).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Hash, Validate)]
pub struct ValidationTarget {
    #[serde(default = "default_region")]
    #[validate(length(min = 1))]
    pub region: String,

    #[validate(length(min = 1, message = "product_type cannot be empty"))]
    pub product_type: String,

    #[validate(length(min = 1, message = "exchange cannot be empty"))]
    pub exchange: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[validate(length(min = 1, message = "project name cannot be empty"))]
    pub name: String,
    pub version: String,

    #[serde(rename = "rules-path", default = "default_rules_path")]
    pub rules_path: String,

    #[serde(rename = "data-path", default = "default_data_path")]
    pub data_path: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(rename = "default-region", default = "default_region")]
    pub default_region: String,

    #[serde(rename = "record-key-column", default = "default_record_key_column")]
    pub record_key_column: String,

    /// Parallel validation passes; bounded by what the dataset source can serve.
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,

    #[serde(rename = "dataset-cache-ttl-secs", default = "default_cache_ttl")]
    pub dataset_cache_ttl_secs: u64,

    #[serde(rename = "timeout-secs", default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Distinct offending values kept per expectation.
    #[serde(rename = "sample-size", default = "default_sample_size")]
    #[validate(range(min = 1, max = 1000))]
    pub sample_size: usize,

    #[serde(default)]
    #[validate(nested)]
    pub targets: Vec<ValidationTarget>,
}

impl ProjectConfig {
    pub fn dataset_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dataset_cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "refguard".to_string(),
            version: "1.0".to_string(),
            rules_path: default_rules_path(),
            data_path: default_data_path(),
            database: default_database(),
            default_region: default_region(),
            record_key_column: default_record_key_column(),
            workers: default_workers(),
            dataset_cache_ttl_secs: default_cache_ttl(),
            timeout_secs: default_timeout(),
            sample_size: default_sample_size(),
            targets: Vec::new(),
        }
    }
}

fn default_rules_path() -> String {
    "rules".to_string()
}
fn default_data_path() -> String {
    "data".to_string()
}
fn default_database() -> String {
    "refguard.duckdb".to_string()
}
fn default_region() -> String {
    "GLOBAL".to_string()
}
fn default_record_key_column() -> String {
    "MasterId".to_string()
}
fn default_workers() -> usize {
    4
}
fn default_cache_ttl() -> u64 {
    60
}
fn default_timeout() -> u64 {
    120
}
fn default_sample_size() -> usize {
    20
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let yaml = "name: apac_refdata\nversion: '1.0'\n";
        let config: ProjectConfig = serde_yaml::from_str(yaml).expect("Should deserialize");
        assert_eq!(config.rules_path, "rules");
        assert_eq!(config.record_key_column, "MasterId");
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert!(config.targets.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_targets_and_validation() {
        let yaml = r#"
name: apac_refdata
version: "1.0"
workers: 0
targets:
  - region: APAC
    product_type: stock
    exchange: HKEX
  - product_type: ""
    exchange: XTKS
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].region, "GLOBAL");

        let errors = config.validate().unwrap_err().to_string();
        assert!(errors.contains("workers"));
        assert!(errors.contains("product_type"));
    }
}
