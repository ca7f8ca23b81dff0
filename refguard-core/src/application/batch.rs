// refguard-core/src/application/batch.rs

use futures::StreamExt;
use std::time::Instant;
use tracing::{info, warn};

use crate::application::validation::{ValidationRequest, ValidationService};
use crate::domain::project::ValidationTarget;
use crate::domain::run::ValidationRun;
use crate::error::RefGuardError;

/// What happened to one target of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub target: ValidationTarget,
    pub outcome: Result<ValidationRun, RefGuardError>,
}

impl BatchOutcome {
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, Ok(run) if run.success)
    }
}

/// Validates independent targets with at most `workers` passes in flight.
///
/// A failing target never stops the others. Outcomes come back in input order.
pub async fn run_batch(
    service: &ValidationService,
    targets: &[ValidationTarget],
    workers: usize,
) -> Vec<BatchOutcome> {
    let workers = workers.max(1);
    let started = Instant::now();
    info!(targets = targets.len(), workers, "Starting validation batch");

    let passes = targets.iter().enumerate().map(|(index, target)| async move {
        let request = ValidationRequest::from(target);
        let outcome = service.execute_validation_run(&request).await;
        if let Err(e) = &outcome {
            warn!(
                region = %target.region,
                product_type = %target.product_type,
                exchange = %target.exchange,
                "Validation pass failed: {}",
                e
            );
        }
        (
            index,
            BatchOutcome {
                target: target.clone(),
                outcome,
            },
        )
    });

    // buffer_unordered yields in completion order
    let mut outcomes: Vec<(usize, BatchOutcome)> = futures::stream::iter(passes)
        .buffer_unordered(workers)
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);

    let outcomes: Vec<BatchOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();
    info!(
        passed = outcomes.iter().filter(|o| o.passed()).count(),
        errors = outcomes.iter().filter(|o| o.outcome.is_err()).count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Validation batch done"
    );
    outcomes
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::{Dataset, InstrumentRecord};
    use crate::domain::error::DomainError;
    use crate::domain::project::ProjectConfig;
    use crate::domain::rules::{RuleDefinition, RuleLevel};
    use crate::domain::run::{RollupBucket, RollupFilter, RunSummary};
    use crate::ports::{DatasetProvider, RuleScope, RuleStore, RunStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct OneRule;

    impl RuleStore for OneRule {
        fn get(
            &self,
            level: RuleLevel,
            _scope: &RuleScope,
        ) -> Result<Vec<RuleDefinition>, DomainError> {
            Ok(match level {
                RuleLevel::Global => vec![RuleDefinition::new(
                    level,
                    "not_null",
                    "MasterId",
                    "base.yaml",
                )],
                _ => vec![],
            })
        }
    }

    /// Slower for lower exchange numbers, so completion order is the reverse of input order.
    #[derive(Default)]
    struct SlowDatasets {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DatasetProvider for SlowDatasets {
        async fn load(&self, product_type: &str, exchange: &str) -> Result<Dataset, RefGuardError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let rank: u64 = exchange.trim_start_matches('X').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(60 - rank * 10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if exchange == "X3" {
                return Err(RefGuardError::DataSource {
                    product_type: product_type.into(),
                    exchange: exchange.into(),
                    reason: "offline".into(),
                });
            }
            Ok(Dataset::new(vec![
                InstrumentRecord::new().with("MasterId", "1"),
            ]))
        }

        fn provider_name(&self) -> &str {
            "slow"
        }
    }

    #[derive(Default)]
    struct MemoryRuns(Mutex<Vec<ValidationRun>>);

    #[async_trait]
    impl RunStore for MemoryRuns {
        async fn record(&self, run: &ValidationRun) -> Result<(), RefGuardError> {
            self.0.lock().unwrap().push(run.clone());
            Ok(())
        }
        async fn get_run(&self, _run_id: &str) -> Result<Option<ValidationRun>, RefGuardError> {
            Ok(None)
        }
        async fn recent_runs(&self, _limit: usize) -> Result<Vec<RunSummary>, RefGuardError> {
            Ok(vec![])
        }
        async fn success_trend(
            &self,
            _filter: &RollupFilter,
        ) -> Result<Vec<RollupBucket>, RefGuardError> {
            Ok(vec![])
        }
        async fn success_heatmap(
            &self,
            _filter: &RollupFilter,
        ) -> Result<Vec<RollupBucket>, RefGuardError> {
            Ok(vec![])
        }
        async fn column_failures(
            &self,
            _filter: &RollupFilter,
        ) -> Result<Vec<RollupBucket>, RefGuardError> {
            Ok(vec![])
        }
    }

    fn target(exchange: &str) -> ValidationTarget {
        ValidationTarget {
            region: "APAC".into(),
            product_type: "stock".into(),
            exchange: exchange.into(),
            custom_rules: None,
        }
    }

    #[tokio::test]
    async fn test_batch_is_bounded_ordered_and_isolated() {
        let datasets = Arc::new(SlowDatasets::default());
        let runs = Arc::new(MemoryRuns::default());
        let service = ValidationService::new(
            Arc::new(OneRule),
            Arc::clone(&datasets) as Arc<dyn DatasetProvider>,
            Arc::clone(&runs) as Arc<dyn RunStore>,
            &ProjectConfig::default(),
        );
        let targets: Vec<_> = (1..=5).map(|i| target(&format!("X{}", i))).collect();

        let outcomes = run_batch(&service, &targets, 2).await;

        let order: Vec<&str> = outcomes.iter().map(|o| o.target.exchange.as_str()).collect();
        assert_eq!(order, vec!["X1", "X2", "X3", "X4", "X5"]);
        assert!(datasets.peak.load(Ordering::SeqCst) <= 2);

        // One unreachable dataset, four recorded runs
        assert!(outcomes[2].outcome.is_err());
        assert_eq!(outcomes.iter().filter(|o| o.passed()).count(), 4);
        assert_eq!(runs.0.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let service = ValidationService::new(
            Arc::new(OneRule),
            Arc::new(SlowDatasets::default()),
            Arc::new(MemoryRuns::default()),
            &ProjectConfig::default(),
        );
        assert!(run_batch(&service, &[], 0).await.is_empty());
    }
}
