// refguard-core/src/domain/expectations/uniqueness.rs

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::dataset::{Dataset, canonical_text, is_missing};
use crate::domain::expectations::ColumnCheck;
use crate::domain::expectations::result::{
    ResultDetails, ScanCounts, UnexpectedValueCount, sort_counts,
};

/// Every non-missing value must occur once. All rows of a duplicated value are unexpected.
#[derive(Debug, Clone)]
pub struct UniqueCheck {
    pub column: String,
}

impl ColumnCheck for UniqueCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        let mut counts = ScanCounts::over_rows(dataset.len());

        // canonical text -> (first value seen, occurrences)
        let mut occurrences: HashMap<String, (Value, usize)> = HashMap::new();
        for record in dataset.iter() {
            let value = record.get(&self.column);
            match value {
                Some(v) if !is_missing(value) => {
                    occurrences
                        .entry(canonical_text(v))
                        .or_insert_with(|| (v.clone(), 0))
                        .1 += 1;
                }
                _ => counts.missing_count += 1,
            }
        }

        let duplicates: Vec<UnexpectedValueCount> = occurrences
            .iter()
            .filter(|(_, (_, n))| *n > 1)
            .map(|(_, (value, n))| UnexpectedValueCount {
                value: value.clone(),
                count: *n,
            })
            .collect();
        counts.unexpected_count = duplicates.iter().map(|d| d.count).sum();

        let mut index_list = Vec::new();
        if counts.unexpected_count > 0 {
            for (row, record) in dataset.iter().enumerate() {
                if index_list.len() >= sample_size {
                    break;
                }
                let value = record.get(&self.column);
                if let Some(v) = value
                    && !is_missing(value)
                    && occurrences
                        .get(&canonical_text(v))
                        .is_some_and(|(_, n)| *n > 1)
                {
                    index_list.push(row);
                }
            }
        }

        let mut sample = sort_counts(duplicates);
        sample.truncate(sample_size);

        (
            counts,
            ResultDetails {
                partial_unexpected_counts: sample,
                partial_unexpected_index_list: index_list,
                rule_error: None,
            },
        )
    }
}
