// refguard/src/commands/runs.rs
//
// USE CASE: Browse the run history.

use std::path::Path;

use refguard_core::domain::run::RunSummary;
use refguard_core::ports::run_store::RunStore;

use super::{ProjectContext, emit_json};
use crate::cli::OutputFormat;
use crate::render;

pub async fn execute(
    project_dir: &Path,
    run_id: Option<&str>,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let ctx = ProjectContext::load(project_dir)?;
    let store = ctx.run_store()?;

    let Some(run_id) = run_id else {
        let runs = store.recent_runs(limit).await?;
        match format {
            OutputFormat::Json => emit_json(&runs, None)?,
            OutputFormat::Table => println!("{}", render::runs_table(&runs)),
        }
        return Ok(true);
    };

    let run = store
        .get_run(run_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No run with id {}", run_id))?;

    match format {
        OutputFormat::Json => emit_json(&run, None)?,
        OutputFormat::Table => {
            println!("{}", render::runs_table(&[RunSummary::from(&run)]));
            println!("{}", render::results_table(&run.to_result()));
        }
    }
    Ok(true)
}
