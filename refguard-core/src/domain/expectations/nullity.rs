// refguard-core/src/domain/expectations/nullity.rs

use serde_json::Value;

use crate::domain::dataset::{Dataset, is_missing};
use crate::domain::expectations::ColumnCheck;
use crate::domain::expectations::result::{ResultDetails, ScanCounts, UnexpectedSampler};

/// Missing values are the violations; they are also reported as unexpected.
#[derive(Debug, Clone)]
pub struct NotNullCheck {
    pub column: String,
}

impl ColumnCheck for NotNullCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        let mut counts = ScanCounts::over_rows(dataset.len());
        let mut sampler = UnexpectedSampler::new(sample_size);

        for (row, record) in dataset.iter().enumerate() {
            let value = record.get(&self.column);
            if is_missing(value) {
                counts.missing_count += 1;
                counts.unexpected_count += 1;
                sampler.record(row, value.unwrap_or(&Value::Null));
            }
        }

        (counts, sampler.into_details())
    }
}

/// Every row must be missing; present values are unexpected.
#[derive(Debug, Clone)]
pub struct IsNullCheck {
    pub column: String,
}

impl ColumnCheck for IsNullCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        let mut counts = ScanCounts::over_rows(dataset.len());
        let mut sampler = UnexpectedSampler::new(sample_size);

        for (row, record) in dataset.iter().enumerate() {
            let value = record.get(&self.column);
            match value {
                Some(v) if !is_missing(value) => {
                    counts.unexpected_count += 1;
                    sampler.record(row, v);
                }
                _ => counts.missing_count += 1,
            }
        }

        (counts, sampler.into_details())
    }
}
