// refguard-core/src/domain/expectations/pattern.rs

use regex::Regex;

use crate::domain::dataset::{Dataset, canonical_text};
use crate::domain::expectations::result::{ResultDetails, ScanCounts};
use crate::domain::expectations::{ColumnCheck, scan_values};

/// Values (as text) must match `regex`. Anchors are up to the rule author.
#[derive(Debug, Clone)]
pub struct RegexCheck {
    pub column: String,
    pub regex: Regex,
}

impl ColumnCheck for RegexCheck {
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails) {
        scan_values(dataset, &self.column, sample_size, |value| {
            self.regex.is_match(&canonical_text(value))
        })
    }
}
