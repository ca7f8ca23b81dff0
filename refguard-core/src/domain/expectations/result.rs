// refguard-core/src/domain/expectations/result.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::dataset::canonical_text;

/// Default cap on distinct offending values (and row indexes) kept per expectation.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// `part / whole * 100`, defined as 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnexpectedValueCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDetails {
    #[serde(default)]
    pub partial_unexpected_counts: Vec<UnexpectedValueCount>,

    #[serde(default)]
    pub partial_unexpected_index_list: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_error: Option<String>,
}

/// Outcome of one expectation against one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationResult {
    #[serde(rename = "ColumnName")]
    pub column_name: String,
    #[serde(rename = "ExpectationType")]
    pub expectation_type: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "ElementCount")]
    pub element_count: usize,
    #[serde(rename = "UnexpectedCount")]
    pub unexpected_count: usize,
    #[serde(rename = "UnexpectedPercent")]
    pub unexpected_percent: f64,
    #[serde(rename = "MissingCount")]
    pub missing_count: usize,
    #[serde(rename = "MissingPercent")]
    pub missing_percent: f64,
    #[serde(rename = "ResultDetails")]
    pub result_details: ResultDetails,
}

impl ExpectationResult {
    /// Builds a result from raw counts; percentages are derived here and only here.
    pub fn from_counts(
        column_name: &str,
        expectation_type: &str,
        success: bool,
        counts: &ScanCounts,
        result_details: ResultDetails,
    ) -> Self {
        Self {
            column_name: column_name.to_string(),
            expectation_type: expectation_type.to_string(),
            success,
            element_count: counts.element_count,
            unexpected_count: counts.unexpected_count,
            unexpected_percent: percent(counts.unexpected_count, counts.element_count),
            missing_count: counts.missing_count,
            missing_percent: percent(counts.missing_count, counts.row_count),
            result_details,
        }
    }

    /// A rule that could not be evaluated: failed, zero counts, error attached.
    pub fn rule_error(column_name: &str, expectation_type: &str, error: impl Into<String>) -> Self {
        Self::from_counts(
            column_name,
            expectation_type,
            false,
            &ScanCounts::default(),
            ResultDetails {
                rule_error: Some(error.into()),
                ..Default::default()
            },
        )
    }

    pub fn is_rule_error(&self) -> bool {
        self.result_details.rule_error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    /// Rows the check judged: every row for the null families, present values otherwise.
    pub element_count: usize,
    /// Rows scanned, missing ones included.
    pub row_count: usize,
    pub missing_count: usize,
    pub unexpected_count: usize,
}

impl ScanCounts {
    pub fn over_rows(rows: usize) -> Self {
        Self {
            element_count: rows,
            row_count: rows,
            ..Default::default()
        }
    }

    /// Value families judge present values only.
    pub fn present_values_only(mut self) -> Self {
        self.element_count = self.row_count.saturating_sub(self.missing_count);
        self
    }
}

/// Counts offending values while keeping at most `capacity` distinct values
/// and `capacity` row indexes.
#[derive(Debug)]
pub struct UnexpectedSampler {
    capacity: usize,
    slots: HashMap<String, usize>,
    values: Vec<UnexpectedValueCount>,
    indexes: Vec<usize>,
}

impl UnexpectedSampler {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: HashMap::new(),
            values: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn record(&mut self, row: usize, value: &Value) {
        if self.indexes.len() < self.capacity {
            self.indexes.push(row);
        }

        let key = canonical_text(value);
        if let Some(&slot) = self.slots.get(&key) {
            self.values[slot].count += 1;
        } else if self.values.len() < self.capacity {
            self.slots.insert(key, self.values.len());
            self.values.push(UnexpectedValueCount {
                value: value.clone(),
                count: 1,
            });
        }
    }

    pub fn into_details(self) -> ResultDetails {
        ResultDetails {
            partial_unexpected_counts: sort_counts(self.values),
            partial_unexpected_index_list: self.indexes,
            rule_error: None,
        }
    }
}

/// Most frequent first, then by value text.
pub fn sort_counts(mut values: Vec<UnexpectedValueCount>) -> Vec<UnexpectedValueCount> {
    values.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| canonical_text(&a.value).cmp(&canonical_text(&b.value)))
    });
    values
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_math() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(3, 10), 30.0);
        assert!(percent(1, 3).is_finite());
    }

    #[test]
    fn test_zero_elements_never_produce_nan() {
        let result = ExpectationResult::from_counts(
            "Symbol",
            "expect_column_values_to_match_regex",
            true,
            &ScanCounts::default(),
            ResultDetails::default(),
        );
        assert_eq!(result.unexpected_percent, 0.0);
        assert_eq!(result.missing_percent, 0.0);
    }

    #[test]
    fn test_sampler_is_bounded() {
        let mut sampler = UnexpectedSampler::new(3);
        for row in 0..100 {
            sampler.record(row, &json!(format!("v{}", row % 10)));
        }
        let details = sampler.into_details();
        assert_eq!(details.partial_unexpected_counts.len(), 3);
        assert_eq!(details.partial_unexpected_index_list, vec![0, 1, 2]);
        // Tracked values keep counting after the cap is reached.
        assert!(details.partial_unexpected_counts.iter().all(|c| c.count == 10));
    }

    #[test]
    fn test_sampler_sorts_by_frequency() {
        let mut sampler = UnexpectedSampler::new(20);
        sampler.record(0, &json!("b"));
        sampler.record(1, &json!("a"));
        sampler.record(2, &json!("b"));
        sampler.record(3, &json!("c"));
        let counts = sampler.into_details().partial_unexpected_counts;
        let order: Vec<String> = counts.iter().map(|c| canonical_text(&c.value)).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn test_result_shape() {
        let result = ExpectationResult::rule_error("Isin", "expect_foo", "unsupported");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ColumnName"], "Isin");
        assert_eq!(json["Success"], false);
        assert_eq!(json["ElementCount"], 0);
        assert_eq!(json["ResultDetails"]["rule_error"], "unsupported");
    }
}
