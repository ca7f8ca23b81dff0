// refguard-core/src/domain/run/aggregation.rs

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::expectations::ExpectationResult;
use crate::domain::rules::RuleProvenance;

/// Pass/fail counters of one run. Built only through `from_results`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total_expectations: usize,
    pub successful_expectations: usize,
    pub failed_expectations: usize,
}

impl RunTotals {
    pub fn from_results(results: &[ExpectationResult]) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_expectations: results.len(),
            successful_expectations: successful,
            failed_expectations: results.len() - successful,
        }
    }

    pub fn success(&self) -> bool {
        self.failed_expectations == 0
    }
}

/// Identity of the validation pass a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunContext {
    pub region: String,
    pub product_type: String,
    pub exchange: String,
}

/// One execution of a resolved rule set against a dataset. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRun {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub product_type: String,
    pub exchange: String,
    pub success: bool,
    pub total_expectations: usize,
    pub successful_expectations: usize,
    pub failed_expectations: usize,
    pub execution_duration_ms: u64,
    pub expectation_results: Vec<ExpectationResult>,
    pub rules_applied: Vec<RuleProvenance>,
}

impl ValidationRun {
    /// Rolls the expectation results up into a run record.
    pub fn assemble(
        context: RunContext,
        expectation_results: Vec<ExpectationResult>,
        rules_applied: Vec<RuleProvenance>,
        execution_duration_ms: u64,
    ) -> Self {
        let totals = RunTotals::from_results(&expectation_results);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            // Stores keep microseconds
            timestamp: Utc::now().trunc_subsecs(6),
            region: context.region,
            product_type: context.product_type,
            exchange: context.exchange,
            success: totals.success(),
            total_expectations: totals.total_expectations,
            successful_expectations: totals.successful_expectations,
            failed_expectations: totals.failed_expectations,
            execution_duration_ms,
            expectation_results,
            rules_applied,
        }
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals {
            total_expectations: self.total_expectations,
            successful_expectations: self.successful_expectations,
            failed_expectations: self.failed_expectations,
        }
    }

    /// `Total == Successful + Failed` and `Success == (Failed == 0)`.
    pub fn is_consistent(&self) -> bool {
        self.total_expectations == self.successful_expectations + self.failed_expectations
            && self.success == (self.failed_expectations == 0)
            && self.total_expectations == self.expectation_results.len()
    }

    pub fn context(&self) -> RunContext {
        RunContext {
            region: self.region.clone(),
            product_type: self.product_type.clone(),
            exchange: self.exchange.clone(),
        }
    }

    pub fn to_result(&self) -> ValidationRunResult {
        ValidationRunResult {
            exchange: self.exchange.clone(),
            success: self.success,
            total_expectations: self.total_expectations,
            successful_expectations: self.successful_expectations,
            failed_expectations: self.failed_expectations,
            results: ExpectationResults {
                expectation_results: self.expectation_results.clone(),
            },
            rules_applied: self.rules_applied.clone(),
        }
    }
}

/// Run header without children, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub product_type: String,
    pub exchange: String,
    pub success: bool,
    pub total_expectations: usize,
    pub successful_expectations: usize,
    pub failed_expectations: usize,
    pub execution_duration_ms: u64,
}

impl From<&ValidationRun> for RunSummary {
    fn from(run: &ValidationRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            timestamp: run.timestamp,
            region: run.region.clone(),
            product_type: run.product_type.clone(),
            exchange: run.exchange.clone(),
            success: run.success,
            total_expectations: run.total_expectations,
            successful_expectations: run.successful_expectations,
            failed_expectations: run.failed_expectations,
            execution_duration_ms: run.execution_duration_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationResults {
    pub expectation_results: Vec<ExpectationResult>,
}

/// Response shape consumed by the reporting layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRunResult {
    pub exchange: String,
    pub success: bool,
    pub total_expectations: usize,
    pub successful_expectations: usize,
    pub failed_expectations: usize,
    pub results: ExpectationResults,
    pub rules_applied: Vec<RuleProvenance>,
}

impl ValidationRunResult {
    /// Failed expectations first, original order otherwise.
    pub fn failed_first(&self) -> Vec<&ExpectationResult> {
        let mut results: Vec<&ExpectationResult> =
            self.results.expectation_results.iter().collect();
        results.sort_by_key(|r| r.success);
        results
    }
}
