// refguard-core/src/domain/expectations/column_pair.rs

use serde_json::Value;

use crate::domain::dataset::{Dataset, as_number, canonical_text, is_missing};
use crate::domain::expectations::ColumnCheck;
use crate::domain::expectations::result::{ResultDetails, ScanCounts, UnexpectedSampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairComparison {
    Equal,
    GreaterThan { or_equal: bool },
}

/// Row-wise comparison of `column` (A) against `column_b` (B).
/// A row is missing when either side is missing.
#[derive(Debug, Clone)]
pub struct PairCheck {
    pub column: String,
    pub column_b: String,
    pub comparison: PairComparison,
}

impl PairCheck {
    fn accepts(&self, a: &Value, b: &Value) -> bool {
        match self.comparison {
            PairComparison::Equal => canonical_text(a) == canonical_text(b),
            PairComparison::GreaterThan { or_equal } => match (as_number(a), as_number(b)) {
                (Some(a), Some(b)) if or_equal => a >= b,
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
        }
    }
}

impl ColumnCheck for PairCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        let mut counts = ScanCounts::over_rows(dataset.len());
        let mut sampler = UnexpectedSampler::new(sample_size);

        for (row, record) in dataset.iter().enumerate() {
            let a = record.get(&self.column);
            let b = record.get(&self.column_b);
            match (a, b) {
                (Some(a), Some(b)) if !is_missing(Some(a)) && !is_missing(Some(b)) => {
                    if !self.accepts(a, b) {
                        counts.unexpected_count += 1;
                        sampler.record(row, &Value::Array(vec![a.clone(), b.clone()]));
                    }
                }
                _ => counts.missing_count += 1,
            }
        }

        (counts.present_values_only(), sampler.into_details())
    }
}
