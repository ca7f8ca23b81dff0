// refguard-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{Config, Connection, params, params_from_iter};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

// Imports Hexagonaux
use crate::domain::dataset::{Dataset, InstrumentRecord};
use crate::domain::expectations::{ExpectationResult, ResultDetails};
use crate::domain::rules::{RuleLevel, RuleProvenance};
use crate::domain::run::{RollupBucket, RollupFilter, RunSummary, ValidationRun};
use crate::error::RefGuardError;
use crate::infrastructure::config::rules::ensure_safe_name;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::dataset::DatasetProvider;
use crate::ports::run_store::RunStore;

fn open_connection(db_path: &str) -> Result<Connection, InfrastructureError> {
    let config = Config::default();
    let conn = if db_path == ":memory:" {
        Connection::open_in_memory_with_flags(config)?
    } else {
        Connection::open_with_flags(db_path, config)?
    };
    Ok(conn)
}

/// Column names of a table or view, in declaration order.
fn fetch_columns(conn: &Connection, table_name: &str) -> Result<Vec<String>, InfrastructureError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table_name))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// --- DATASETS (CSV via DuckDB) ---

/// Reads `{data_root}/{product_type}/{exchange}.csv`, every column as text.
pub struct DuckDbDatasetProvider {
    data_root: PathBuf,
}

impl DuckDbDatasetProvider {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn dataset_path(
        &self,
        product_type: &str,
        exchange: &str,
    ) -> Result<PathBuf, RefGuardError> {
        ensure_safe_name("product type", product_type)?;
        ensure_safe_name("exchange", exchange)?;
        Ok(self
            .data_root
            .join(product_type.to_lowercase())
            .join(format!("{}.csv", exchange)))
    }

    fn read_csv(path: &Path) -> Result<Dataset, InfrastructureError> {
        // Une connexion éphémère par chargement : pas de contention avec le run store
        let conn = open_connection(":memory:")?;
        let escaped = path.to_string_lossy().replace('\'', "''");
        conn.execute(
            &format!(
                "CREATE OR REPLACE VIEW \"dataset\" AS \
                 SELECT * FROM read_csv_auto('{}', header = true, all_varchar = true)",
                escaped
            ),
            [],
        )?;

        let columns = fetch_columns(&conn, "dataset")?;
        let mut stmt = conn.prepare("SELECT * FROM \"dataset\"")?;
        let rows = stmt.query_map([], |row| {
            let mut record = InstrumentRecord::new();
            for (i, name) in columns.iter().enumerate() {
                let value: Option<String> = row.get(i)?;
                record.insert(name, value.map_or(Value::Null, Value::String));
            }
            Ok(record)
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(Dataset::new(records))
    }
}

#[async_trait]
impl DatasetProvider for DuckDbDatasetProvider {
    #[instrument(skip(self))]
    async fn load(&self, product_type: &str, exchange: &str) -> Result<Dataset, RefGuardError> {
        let path = self.dataset_path(product_type, exchange)?;
        let unavailable = |reason: String| RefGuardError::DataSource {
            product_type: product_type.to_string(),
            exchange: exchange.to_string(),
            reason,
        };

        if !path.is_file() {
            return Err(unavailable(format!("{} not found", path.display())));
        }

        let dataset = tokio::task::spawn_blocking(move || Self::read_csv(&path))
            .await
            .map_err(|e| RefGuardError::InternalError(format!("Dataset loader panicked: {}", e)))?
            .map_err(|e| unavailable(e.to_string()))?;

        debug!(rows = dataset.len(), "Dataset loaded");
        Ok(dataset)
    }

    fn provider_name(&self) -> &str {
        "duckdb-csv"
    }
}

// --- RUN STORE ---

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS validation_runs (
    run_id VARCHAR PRIMARY KEY,
    run_timestamp VARCHAR NOT NULL,
    region VARCHAR NOT NULL,
    product_type VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    success BOOLEAN NOT NULL,
    total_expectations BIGINT NOT NULL,
    successful_expectations BIGINT NOT NULL,
    failed_expectations BIGINT NOT NULL,
    execution_duration_ms BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS expectation_results (
    run_id VARCHAR NOT NULL,
    position INTEGER NOT NULL,
    column_name VARCHAR NOT NULL,
    expectation_type VARCHAR NOT NULL,
    success BOOLEAN NOT NULL,
    element_count BIGINT NOT NULL,
    unexpected_count BIGINT NOT NULL,
    unexpected_percent DOUBLE NOT NULL,
    missing_count BIGINT NOT NULL,
    missing_percent DOUBLE NOT NULL,
    result_details VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS rule_provenance (
    run_id VARCHAR NOT NULL,
    position INTEGER NOT NULL,
    rule_name VARCHAR NOT NULL,
    rule_type VARCHAR NOT NULL,
    rule_level INTEGER NOT NULL,
    rule_source VARCHAR NOT NULL
);
";

const RUN_COLUMNS: &str = "run_id, run_timestamp, region, product_type, exchange, success, \
     total_expectations, successful_expectations, failed_expectations, execution_duration_ms";

/// Fixed-width UTC text, so that string order is time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, InfrastructureError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| InfrastructureError::CorruptRun(format!("timestamp '{}': {}", raw, e)))
}

/// Runs and their children, append-only, in a DuckDB file.
pub struct DuckDbRunStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbRunStore {
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, InfrastructureError> {
        let conn = open_connection(db_path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Run store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, InfrastructureError> {
        self.conn
            .lock()
            .map_err(|_| InfrastructureError::Database(DatabaseError::Poisoned))
    }

    fn insert_run(conn: &mut Connection, run: &ValidationRun) -> Result<(), InfrastructureError> {
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO validation_runs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                RUN_COLUMNS
            ),
            params![
                run.run_id,
                format_timestamp(&run.timestamp),
                run.region,
                run.product_type,
                run.exchange,
                run.success,
                run.total_expectations as i64,
                run.successful_expectations as i64,
                run.failed_expectations as i64,
                run.execution_duration_ms as i64,
            ],
        )?;

        for (position, result) in run.expectation_results.iter().enumerate() {
            let details = serde_json::to_string(&result.result_details)?;
            tx.execute(
                "INSERT INTO expectation_results VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    run.run_id,
                    position as i32,
                    result.column_name,
                    result.expectation_type,
                    result.success,
                    result.element_count as i64,
                    result.unexpected_count as i64,
                    result.unexpected_percent,
                    result.missing_count as i64,
                    result.missing_percent,
                    details,
                ],
            )?;
        }

        for (position, rule) in run.rules_applied.iter().enumerate() {
            tx.execute(
                "INSERT INTO rule_provenance VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    run.run_id,
                    position as i32,
                    rule.rule_name,
                    rule.rule_type,
                    rule.rule_level.as_u8() as i32,
                    rule.rule_source,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn summaries(
        conn: &Connection,
        sql: &str,
        values: &[String],
    ) -> Result<Vec<RunSummary>, InfrastructureError> {
        struct Raw {
            summary: RunSummary,
            timestamp: String,
        }

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(Raw {
                timestamp: row.get(1)?,
                summary: RunSummary {
                    run_id: row.get(0)?,
                    timestamp: DateTime::<Utc>::MIN_UTC,
                    region: row.get(2)?,
                    product_type: row.get(3)?,
                    exchange: row.get(4)?,
                    success: row.get(5)?,
                    total_expectations: row.get::<_, i64>(6)? as usize,
                    successful_expectations: row.get::<_, i64>(7)? as usize,
                    failed_expectations: row.get::<_, i64>(8)? as usize,
                    execution_duration_ms: row.get::<_, i64>(9)? as u64,
                },
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let Raw {
                mut summary,
                timestamp,
            } = row?;
            summary.timestamp = parse_timestamp(&timestamp)?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn load_run(
        conn: &Connection,
        run_id: &str,
    ) -> Result<Option<ValidationRun>, InfrastructureError> {
        let header = Self::summaries(
            conn,
            &format!("SELECT {} FROM validation_runs WHERE run_id = ?", RUN_COLUMNS),
            &[run_id.to_string()],
        )?;
        let Some(header) = header.into_iter().next() else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT column_name, expectation_type, success, element_count, unexpected_count, \
             unexpected_percent, missing_count, missing_percent, result_details \
             FROM expectation_results WHERE run_id = ? ORDER BY position",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                ExpectationResult {
                    column_name: row.get(0)?,
                    expectation_type: row.get(1)?,
                    success: row.get(2)?,
                    element_count: row.get::<_, i64>(3)? as usize,
                    unexpected_count: row.get::<_, i64>(4)? as usize,
                    unexpected_percent: row.get(5)?,
                    missing_count: row.get::<_, i64>(6)? as usize,
                    missing_percent: row.get(7)?,
                    result_details: ResultDetails::default(),
                },
                row.get::<_, String>(8)?,
            ))
        })?;
        let mut expectation_results = Vec::new();
        for row in rows {
            let (mut result, details) = row?;
            result.result_details = serde_json::from_str(&details)?;
            expectation_results.push(result);
        }

        let mut stmt = conn.prepare(
            "SELECT rule_name, rule_type, rule_level, rule_source \
             FROM rule_provenance WHERE run_id = ? ORDER BY position",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut rules_applied = Vec::new();
        for row in rows {
            let (rule_name, rule_type, level, rule_source) = row?;
            let rule_level = u8::try_from(level)
                .map_err(|e| e.to_string())
                .and_then(RuleLevel::try_from)
                .map_err(InfrastructureError::CorruptRun)?;
            rules_applied.push(RuleProvenance {
                rule_name,
                rule_type,
                rule_level,
                rule_source,
            });
        }

        Ok(Some(ValidationRun {
            run_id: header.run_id,
            timestamp: header.timestamp,
            region: header.region,
            product_type: header.product_type,
            exchange: header.exchange,
            success: header.success,
            total_expectations: header.total_expectations,
            successful_expectations: header.successful_expectations,
            failed_expectations: header.failed_expectations,
            execution_duration_ms: header.execution_duration_ms,
            expectation_results,
            rules_applied,
        }))
    }

    fn buckets(
        conn: &Connection,
        sql: &str,
        values: &[String],
    ) -> Result<Vec<RollupBucket>, InfrastructureError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(RollupBucket::new(
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? as u64,
                row.get::<_, i64>(2)? as u64,
                row.get::<_, i64>(3)? as u64,
            ))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// `WHERE` clause over `validation_runs` aliased as `r`, with its positional values.
fn where_clause(filter: &RollupFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    let columns = [
        ("r.region", &filter.region),
        ("r.product_type", &filter.product_type),
        ("r.exchange", &filter.exchange),
    ];
    for (column, value) in columns {
        if let Some(value) = value {
            clauses.push(format!("{} = ?", column));
            values.push(value.clone());
        }
    }
    if let Some(since) = &filter.since {
        clauses.push("r.run_timestamp >= ?".to_string());
        values.push(format_timestamp(since));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

#[async_trait]
impl RunStore for DuckDbRunStore {
    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn record(&self, run: &ValidationRun) -> Result<(), RefGuardError> {
        // DuckDB calls block: keep them off the async workers
        let conn = Arc::clone(&self.conn);
        let owned = run.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| InfrastructureError::Database(DatabaseError::Poisoned))?;
            Self::insert_run(&mut conn, &owned)
        })
        .await
        .map_err(|e| RefGuardError::InternalError(format!("Run writer panicked: {}", e)))??;
        debug!(results = run.expectation_results.len(), "Run recorded");
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<ValidationRun>, RefGuardError> {
        let conn = self.lock()?;
        Ok(Self::load_run(&conn, run_id)?)
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>, RefGuardError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM validation_runs ORDER BY run_timestamp DESC, run_id LIMIT {}",
            RUN_COLUMNS, limit
        );
        Ok(Self::summaries(&conn, &sql, &[])?)
    }

    async fn success_trend(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!(
            "SELECT substr(r.run_timestamp, 1, 10) AS day, COUNT(*), \
             CAST(SUM(r.successful_expectations) AS BIGINT), \
             CAST(SUM(r.total_expectations) AS BIGINT) \
             FROM validation_runs r {} GROUP BY day ORDER BY day",
            where_sql
        );
        let conn = self.lock()?;
        Ok(Self::buckets(&conn, &sql, &values)?)
    }

    async fn success_heatmap(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!(
            "SELECT r.region || '/' || r.exchange AS cell, COUNT(*), \
             CAST(SUM(r.successful_expectations) AS BIGINT), \
             CAST(SUM(r.total_expectations) AS BIGINT) \
             FROM validation_runs r {} GROUP BY cell ORDER BY cell",
            where_sql
        );
        let conn = self.lock()?;
        Ok(Self::buckets(&conn, &sql, &values)?)
    }

    async fn column_failures(
        &self,
        filter: &RollupFilter,
    ) -> Result<Vec<RollupBucket>, RefGuardError> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!(
            "SELECT e.column_name || '/' || e.expectation_type AS rule, \
             COUNT(DISTINCT e.run_id), \
             CAST(SUM(CASE WHEN e.success THEN 1 ELSE 0 END) AS BIGINT), \
             COUNT(*) \
             FROM expectation_results e JOIN validation_runs r ON r.run_id = e.run_id {} \
             GROUP BY rule \
             ORDER BY COUNT(*) - SUM(CASE WHEN e.success THEN 1 ELSE 0 END) DESC, rule",
            where_sql
        );
        let conn = self.lock()?;
        Ok(Self::buckets(&conn, &sql, &values)?)
    }
}
