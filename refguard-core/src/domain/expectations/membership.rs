// refguard-core/src/domain/expectations/membership.rs

use std::collections::HashSet;

use crate::domain::dataset::{Dataset, canonical_text};
use crate::domain::expectations::result::{ResultDetails, ScanCounts};
use crate::domain::expectations::{ColumnCheck, scan_values};

/// Values must (or, when `exclude` is set, must not) belong to `value_set`.
#[derive(Debug, Clone)]
pub struct SetCheck {
    pub column: String,
    pub value_set: HashSet<String>,
    pub exclude: bool,
}

impl ColumnCheck for SetCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        scan_values(dataset, &self.column, sample_size, |value| {
            self.value_set.contains(&canonical_text(value)) != self.exclude
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::InstrumentRecord;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            InstrumentRecord::new().with("Currency", "HKD"),
            InstrumentRecord::new().with("Currency", "USD"),
            InstrumentRecord::new().with("Currency", "CNY"),
            InstrumentRecord::new().with("Currency", "USD"),
            InstrumentRecord::new(),
        ])
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_in_set() {
        let check = SetCheck {
            column: "Currency".into(),
            value_set: set(&["HKD", "CNY"]),
            exclude: false,
        };
        let (counts, details) = check.scan(&dataset(), 20);
        assert_eq!(counts.element_count, 4);
        assert_eq!(counts.missing_count, 1);
        assert_eq!(counts.unexpected_count, 2);
        assert_eq!(details.partial_unexpected_counts.len(), 1);
        assert_eq!(details.partial_unexpected_counts[0].value, json!("USD"));
        assert_eq!(details.partial_unexpected_counts[0].count, 2);
    }

    #[test]
    fn test_not_in_set() {
        let check = SetCheck {
            column: "Currency".into(),
            value_set: set(&["USD"]),
            exclude: true,
        };
        let (counts, _) = check.scan(&dataset(), 20);
        assert_eq!(counts.unexpected_count, 2);
    }
}
