// refguard-core/src/domain/run/mod.rs

pub mod aggregation;
pub mod rollup;

pub use aggregation::{
    ExpectationResults, RunContext, RunSummary, RunTotals, ValidationRun, ValidationRunResult,
};
pub use rollup::{RollupBucket, RollupFilter, RollupKey, rollup_by, success_rate};
