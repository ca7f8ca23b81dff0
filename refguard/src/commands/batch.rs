// refguard/src/commands/batch.rs
//
// USE CASE: Validate every configured target in parallel.

use std::path::Path;

use serde::Serialize;

use refguard_core::application::{BatchOutcome, run_batch};
use refguard_core::domain::project::ValidationTarget;
use refguard_core::domain::run::ValidationRun;

use super::{ProjectContext, emit_json};
use crate::cli::OutputFormat;
use crate::render;

#[derive(Serialize)]
struct BatchEntry<'a> {
    target: &'a ValidationTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<&'a ValidationRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a BatchOutcome> for BatchEntry<'a> {
    fn from(outcome: &'a BatchOutcome) -> Self {
        let (run, error) = match &outcome.outcome {
            Ok(run) => (Some(run), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            target: &outcome.target,
            run,
            error,
        }
    }
}

pub async fn execute(
    project_dir: &Path,
    workers: Option<usize>,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<bool> {
    let start = std::time::Instant::now();
    let ctx = ProjectContext::load(project_dir)?;
    let targets = ctx.config.targets.clone();
    if targets.is_empty() {
        anyhow::bail!("No targets configured in {}", project_dir.display());
    }

    let workers = workers.unwrap_or(ctx.config.workers);
    let service = ctx.service()?;
    if format == OutputFormat::Table {
        println!(
            "🚀 Validating {} targets ({} workers)...",
            targets.len(),
            workers
        );
    }

    let outcomes = run_batch(&service, &targets, workers).await;
    let passed = outcomes.iter().filter(|o| o.passed()).count();

    match format {
        OutputFormat::Json => {
            let entries: Vec<BatchEntry> = outcomes.iter().map(BatchEntry::from).collect();
            emit_json(&entries, output)?;
        }
        OutputFormat::Table => {
            println!("{}", render::batch_table(&outcomes));
            if passed == outcomes.len() {
                println!(
                    "\n✨ SUCCESS! {} targets passed in {:.2?}",
                    passed,
                    start.elapsed()
                );
            } else {
                eprintln!(
                    "\n❌ FAILURE. {} of {} targets did not pass.",
                    outcomes.len() - passed,
                    outcomes.len()
                );
            }
            if output.is_some() {
                let entries: Vec<BatchEntry> = outcomes.iter().map(BatchEntry::from).collect();
                super::save_json(&serde_json::to_string_pretty(&entries)?, output)?;
            }
        }
    }

    Ok(passed == outcomes.len())
}
