// refguard-core/src/domain/expectations/range.rs

use serde_json::Value;

use crate::domain::dataset::{Dataset, as_number};
use crate::domain::expectations::result::{ResultDetails, ScanCounts};
use crate::domain::expectations::{ColumnCheck, scan_values};

/// Numeric bounds. Non-numeric values are unexpected.
#[derive(Debug, Clone)]
pub struct RangeCheck {
    pub column: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub strict_min: bool,
    pub strict_max: bool,
}

impl RangeCheck {
    fn accepts(&self, value: &Value) -> bool {
        let Some(number) = as_number(value) else {
            return false;
        };
        let above_min = match self.min_value {
            Some(min) if self.strict_min => number > min,
            Some(min) => number >= min,
            None => true,
        };
        let below_max = match self.max_value {
            Some(max) if self.strict_max => number < max,
            Some(max) => number <= max,
            None => true,
        };
        above_min && below_max
    }
}

impl ColumnCheck for RangeCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        scan_values(dataset, &self.column, sample_size, |value| self.accepts(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::InstrumentRecord;
    use serde_json::json;

    fn check(min: Option<f64>, max: Option<f64>) -> RangeCheck {
        RangeCheck {
            column: "LotSize".into(),
            min_value: min,
            max_value: max,
            strict_min: false,
            strict_max: false,
        }
    }

    #[test]
    fn test_inclusive_bounds() {
        let c = check(Some(1.0), Some(100.0));
        assert!(c.accepts(&json!(1)));
        assert!(c.accepts(&json!("100")));
        assert!(!c.accepts(&json!(100.5)));
        assert!(!c.accepts(&json!("n/a")));
    }

    #[test]
    fn test_strict_bounds() {
        let c = RangeCheck {
            strict_min: true,
            strict_max: true,
            ..check(Some(0.0), Some(10.0))
        };
        assert!(!c.accepts(&json!(0)));
        assert!(!c.accepts(&json!(10)));
        assert!(c.accepts(&json!(5)));
    }

    #[test]
    fn test_open_ended() {
        assert!(check(Some(0.0), None).accepts(&json!(1e12)));
        assert!(check(None, Some(0.0)).accepts(&json!(-3)));
    }

    #[test]
    fn test_scan() {
        let dataset = Dataset::new(vec![
            InstrumentRecord::new().with("LotSize", "500"),
            InstrumentRecord::new().with("LotSize", "0"),
            InstrumentRecord::new().with("LotSize", "abc"),
            InstrumentRecord::new().with("LotSize", "2000"),
        ]);
        let (counts, details) = check(Some(1.0), None).scan(&dataset, 20);
        assert_eq!(counts.unexpected_count, 2);
        assert_eq!(details.partial_unexpected_index_list, vec![1, 2]);
    }
}
