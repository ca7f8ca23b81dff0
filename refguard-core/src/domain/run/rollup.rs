// refguard-core/src/domain/run/rollup.rs
//
// Multi-run success rates. Every read path (trend, heatmap, column failures)
// sums successes and totals first and divides once: a mean of per-run
// percentages would over-weight small runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::run::RunTotals;

/// `Σ successful / Σ total * 100`, 0 when nothing ran.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    successful as f64 / total as f64 * 100.0
}

/// Restricts which runs take part in a rollup. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupFilter {
    pub region: Option<String>,
    pub product_type: Option<String>,
    pub exchange: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Grouping key of a bucket (day, "region/exchange", "column/expectation", ...).
pub type RollupKey = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupBucket {
    pub key: RollupKey,
    pub runs: u64,
    pub successful: u64,
    pub total: u64,
}

impl RollupBucket {
    pub fn new(key: impl Into<RollupKey>, runs: u64, successful: u64, total: u64) -> Self {
        Self {
            key: key.into(),
            runs,
            successful,
            total,
        }
    }

    pub fn failed(&self) -> u64 {
        self.total.saturating_sub(self.successful)
    }

    pub fn success_rate(&self) -> f64 {
        success_rate(self.successful, self.total)
    }

    pub fn absorb(&mut self, totals: &RunTotals) {
        self.runs += 1;
        self.successful += totals.successful_expectations as u64;
        self.total += totals.total_expectations as u64;
    }
}

/// In-memory rollup of runs grouped by `key_of`, sorted by key.
pub fn rollup_by<T, F>(items: &[T], key_of: F) -> Vec<RollupBucket>
where
    F: Fn(&T) -> (RollupKey, RunTotals),
{
    let mut buckets: BTreeMap<RollupKey, RollupBucket> = BTreeMap::new();
    for item in items {
        let (key, totals) = key_of(item);
        buckets
            .entry(key.clone())
            .or_insert_with(|| RollupBucket::new(key, 0, 0, 0))
            .absorb(&totals);
    }
    buckets.into_values().collect()
}
