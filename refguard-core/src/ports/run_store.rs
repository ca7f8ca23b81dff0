// refguard-core/src/ports/run_store.rs

use async_trait::async_trait;

use crate::domain::run::{RollupBucket, RollupFilter, RunSummary, ValidationRun};
use crate::error::RefGuardError;

/// Append-only storage of validation runs, plus the read side used by reports.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Writes the run and all of its children atomically.
    async fn record(&self, run: &ValidationRun) -> Result<(), RefGuardError>;

    /// Full detail of one run (expectation results and provenance included).
    async fn get_run(&self, run_id: &str) -> Result<Option<ValidationRun>, RefGuardError>;

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>, RefGuardError>;

    /// Per-day sums of successful/total expectations.
    async fn success_trend(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError>;

    /// Sums per "region/exchange" cell.
    async fn success_heatmap(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError>;

    /// Sums per "column/expectation type" across runs.
    async fn column_failures(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError>;
}
