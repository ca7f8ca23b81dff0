// refguard-core/src/application/validation.rs

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

// Imports Hexagonaux
use crate::application::resolution::resolve_rules;
use crate::domain::dataset::{Dataset, SharedDataset};
use crate::domain::error::DomainError;
use crate::domain::expectations::{ExpectationResult, ValidationExecutor};
use crate::domain::project::{ProjectConfig, ValidationTarget};
use crate::domain::rules::ResolvedRuleSet;
use crate::domain::run::{RunContext, ValidationRun, ValidationRunResult};
use crate::error::RefGuardError;
use crate::infrastructure::cache::DatasetCache;
use crate::ports::dataset::DatasetProvider;
use crate::ports::rule_store::RuleStore;
use crate::ports::run_store::RunStore;

/// One validation pass to run. `region` falls back to the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub region: Option<String>,
    pub product_type: String,
    pub exchange: String,
    pub custom_rules: Option<String>,
}

impl ValidationRequest {
    pub fn new(product_type: &str, exchange: &str) -> Self {
        Self {
            region: None,
            product_type: product_type.to_string(),
            exchange: exchange.to_string(),
            custom_rules: None,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_custom_rules(mut self, custom_rules: Option<&str>) -> Self {
        self.custom_rules = custom_rules.map(str::to_string);
        self
    }
}

impl From<&ValidationTarget> for ValidationRequest {
    fn from(target: &ValidationTarget) -> Self {
        Self {
            region: Some(target.region.clone()),
            product_type: target.product_type.clone(),
            exchange: target.exchange.clone(),
            custom_rules: target.custom_rules.clone(),
        }
    }
}

/// Resolve, load, evaluate, record.
///
/// Rule lookups, dataset loads and run writes go through the ports, so the service
/// is agnostic of where rules, datasets and runs actually live.
pub struct ValidationService {
    rules: Arc<dyn RuleStore>,
    datasets: DatasetCache,
    runs: Arc<dyn RunStore>,
    executor: ValidationExecutor,
    timeout: Duration,
    default_region: String,
    record_key_column: String,
    targets: Vec<ValidationTarget>,
}

impl ValidationService {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        datasets: Arc<dyn DatasetProvider>,
        runs: Arc<dyn RunStore>,
        config: &ProjectConfig,
    ) -> Self {
        Self {
            rules,
            datasets: DatasetCache::new(datasets, config.dataset_cache_ttl()),
            runs,
            executor: ValidationExecutor::new(config.sample_size),
            timeout: config.timeout(),
            default_region: config.default_region.clone(),
            record_key_column: config.record_key_column.clone(),
            targets: config.targets.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn targets(&self) -> &[ValidationTarget] {
        &self.targets
    }

    pub fn datasets(&self) -> &DatasetCache {
        &self.datasets
    }

    pub fn run_store(&self) -> &Arc<dyn RunStore> {
        &self.runs
    }

    // --- USE CASES ---

    pub async fn resolve(
        &self,
        product_type: &str,
        exchange: &str,
        custom_rules: Option<&str>,
    ) -> Result<ResolvedRuleSet, RefGuardError> {
        let store = Arc::clone(&self.rules);
        let product_type = product_type.to_string();
        let exchange = exchange.to_string();
        let custom_rules = custom_rules.map(str::to_string);

        // Rule files are read from disk: keep them off the async workers
        let resolved = tokio::task::spawn_blocking(move || {
            resolve_rules(
                store.as_ref(),
                &product_type,
                &exchange,
                custom_rules.as_deref(),
            )
        })
        .await
        .map_err(|e| RefGuardError::InternalError(format!("Rule resolution panicked: {}", e)))??;
        Ok(resolved)
    }

    /// Field-exact result of one pass. The run itself is persisted before returning.
    pub async fn execute_validation(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationRunResult, RefGuardError> {
        self.execute_validation_run(request)
            .await
            .map(|run| run.to_result())
    }

    #[instrument(
        skip(self, request),
        fields(product_type = %request.product_type, exchange = %request.exchange)
    )]
    pub async fn execute_validation_run(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationRun, RefGuardError> {
        let started = Instant::now();
        let context = self.context_of(request);

        let (rules, results) = self
            .with_deadline(async {
                let rules = self
                    .resolve(
                        &request.product_type,
                        &request.exchange,
                        request.custom_rules.as_deref(),
                    )
                    .await?;
                let dataset = self
                    .datasets
                    .get(&request.product_type, &request.exchange)
                    .await?;
                self.evaluate(rules, dataset).await
            })
            .await?;

        self.record(context, rules, results, started).await
    }

    /// Validates the first record, across the configured targets, whose key equals `record_key`.
    ///
    /// `custom_rules` replaces the target's own custom rule set when given. Targets whose
    /// dataset cannot be loaded are skipped; if the record was found nowhere, the last load
    /// error is returned instead of `RecordNotFound`.
    #[instrument(skip(self))]
    pub async fn validate_record(
        &self,
        record_key: &str,
        custom_rules: Option<&str>,
    ) -> Result<ValidationRunResult, RefGuardError> {
        let started = Instant::now();

        let found = self
            .with_deadline(async {
                let mut last_error = None;
                for target in &self.targets {
                    let lookup =
                        self.find_record(&target.product_type, &target.exchange, record_key);
                    match lookup.await {
                        Ok(Some(dataset)) => return Ok(Some((target.clone(), dataset))),
                        Ok(None) => {}
                        Err(e) if e.is_retryable() => {
                            warn!(
                                product_type = %target.product_type,
                                exchange = %target.exchange,
                                "Skipping target while searching record: {}",
                                e
                            );
                            last_error = Some(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                match last_error {
                    Some(e) => Err(e),
                    None => Ok(None),
                }
            })
            .await?;

        let Some((target, dataset)) = found else {
            return Err(self.record_not_found(record_key));
        };

        let request = ValidationRequest::from(&target)
            .with_custom_rules(custom_rules.or(target.custom_rules.as_deref()));
        self.validate_one(&request, dataset, started).await
    }

    /// Same as `validate_record`, against one explicit (product type, exchange).
    #[instrument(skip(self))]
    pub async fn validate_record_in(
        &self,
        product_type: &str,
        exchange: &str,
        record_key: &str,
        custom_rules: Option<&str>,
    ) -> Result<ValidationRunResult, RefGuardError> {
        let started = Instant::now();

        let dataset = self
            .with_deadline(self.find_record(product_type, exchange, record_key))
            .await?
            .ok_or_else(|| self.record_not_found(record_key))?;

        let mut request =
            ValidationRequest::new(product_type, exchange).with_custom_rules(custom_rules);
        if let Some(target) = self
            .targets
            .iter()
            .find(|t| t.product_type.eq_ignore_ascii_case(product_type) && t.exchange == exchange)
        {
            request.region = Some(target.region.clone());
        }
        self.validate_one(&request, dataset, started).await
    }

    // --- STEPS ---

    fn context_of(&self, request: &ValidationRequest) -> RunContext {
        RunContext {
            region: request
                .region
                .clone()
                .unwrap_or_else(|| self.default_region.clone()),
            product_type: request.product_type.clone(),
            exchange: request.exchange.clone(),
        }
    }

    fn record_not_found(&self, record_key: &str) -> RefGuardError {
        RefGuardError::Domain(DomainError::RecordNotFound {
            key_column: self.record_key_column.clone(),
            record_key: record_key.to_string(),
        })
    }

    async fn with_deadline<T, F>(&self, work: F) -> Result<T, RefGuardError>
    where
        F: Future<Output = Result<T, RefGuardError>>,
    {
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| RefGuardError::Timeout(self.timeout))?
    }

    /// One-row dataset for `record_key`, or `None` when the dataset doesn't have it.
    async fn find_record(
        &self,
        product_type: &str,
        exchange: &str,
        record_key: &str,
    ) -> Result<Option<SharedDataset>, RefGuardError> {
        let dataset = self.datasets.get(product_type, exchange).await?;
        let matched = dataset.filter_by_key(&self.record_key_column, record_key);
        if matched.is_empty() {
            return Ok(None);
        }
        if matched.len() > 1 {
            warn!(
                record_key,
                matches = matched.len(),
                "Record key is not unique, keeping the first match"
            );
        }
        let first = matched.records()[0].clone();
        Ok(Some(Arc::new(Dataset::new(vec![first]))))
    }

    async fn validate_one(
        &self,
        request: &ValidationRequest,
        dataset: SharedDataset,
        started: Instant,
    ) -> Result<ValidationRunResult, RefGuardError> {
        let context = self.context_of(request);
        let (rules, results) = self
            .with_deadline(async {
                let rules = self
                    .resolve(
                        &request.product_type,
                        &request.exchange,
                        request.custom_rules.as_deref(),
                    )
                    .await?;
                self.evaluate(rules, dataset).await
            })
            .await?;

        let run = self.record(context, rules, results, started).await?;
        Ok(run.to_result())
    }

    /// Runs the executor on a blocking thread; one result per resolved rule, in order.
    async fn evaluate(
        &self,
        rules: ResolvedRuleSet,
        dataset: SharedDataset,
    ) -> Result<(ResolvedRuleSet, Vec<ExpectationResult>), RefGuardError> {
        let executor = self.executor;
        tokio::task::spawn_blocking(move || {
            let results = executor.execute(&rules, &dataset);
            (rules, results)
        })
        .await
        .map_err(|e| RefGuardError::InternalError(format!("Rule evaluation panicked: {}", e)))
    }

    /// Assembles the run and writes it within what is left of the pass deadline.
    /// A failed or late write still hands back the computed result.
    async fn record(
        &self,
        context: RunContext,
        rules: ResolvedRuleSet,
        results: Vec<ExpectationResult>,
        started: Instant,
    ) -> Result<ValidationRun, RefGuardError> {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let run = ValidationRun::assemble(context, results, rules.provenance, duration_ms);

        let remaining = self.timeout.saturating_sub(started.elapsed());
        let write = tokio::time::timeout(remaining, self.runs.record(&run))
            .await
            .unwrap_or_else(|_| Err(RefGuardError::Timeout(self.timeout)));

        if let Err(e) = write {
            warn!(run_id = %run.run_id, "Run could not be recorded: {}", e);
            return Err(RefGuardError::NotRecorded {
                result: Box::new(run.to_result()),
                reason: e.to_string(),
            });
        }

        info!(
            run_id = %run.run_id,
            region = %run.region,
            success = run.success,
            total = run.total_expectations,
            failed = run.failed_expectations,
            duration_ms = run.execution_duration_ms,
            "Validation run recorded"
        );
        Ok(run)
    }
}
