// refguard-core/src/application/reporting.rs

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::run::{RollupBucket, RollupFilter};
use crate::error::RefGuardError;
use crate::ports::run_store::RunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Per day
    Trend,
    /// Per region/exchange
    Heatmap,
    /// Per column/expectation type
    Columns,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportKind::Trend => "trend",
            ReportKind::Heatmap => "heatmap",
            ReportKind::Columns => "columns",
        };
        f.write_str(label)
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trend" => Ok(ReportKind::Trend),
            "heatmap" => Ok(ReportKind::Heatmap),
            "columns" | "column-failures" => Ok(ReportKind::Columns),
            other => Err(format!(
                "unknown report '{}', expected trend, heatmap or columns",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub runs: u64,
    pub successful: u64,
    pub failed: u64,
    pub total: u64,
    pub success_rate: f64,
}

impl From<&RollupBucket> for ReportRow {
    fn from(bucket: &RollupBucket) -> Self {
        Self {
            key: bucket.key.clone(),
            runs: bucket.runs,
            successful: bucket.successful,
            failed: bucket.failed(),
            total: bucket.total,
            success_rate: bucket.success_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub filter: RollupFilter,
    pub rows: Vec<ReportRow>,
    /// Sums over every row; the rate is recomputed from the sums.
    pub overall: ReportRow,
}

pub async fn build_report(
    store: &dyn RunStore,
    kind: ReportKind,
    filter: &RollupFilter,
) -> Result<Report, RefGuardError> {
    let buckets = match kind {
        ReportKind::Trend => store.success_trend(filter).await?,
        ReportKind::Heatmap => store.success_heatmap(filter).await?,
        ReportKind::Columns => store.column_failures(filter).await?,
    };

    let overall = buckets.iter().fold(RollupBucket::new("ALL", 0, 0, 0), |mut acc, b| {
        acc.runs += b.runs;
        acc.successful += b.successful;
        acc.total += b.total;
        acc
    });

    Ok(Report {
        kind,
        filter: filter.clone(),
        rows: buckets.iter().map(ReportRow::from).collect(),
        overall: ReportRow::from(&overall),
    })
}
