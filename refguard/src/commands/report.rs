// refguard/src/commands/report.rs
//
// USE CASE: Success rates over the recorded runs.

use std::path::Path;

use chrono::{Duration, Utc};

use refguard_core::application::{ReportKind, build_report};
use refguard_core::domain::run::RollupFilter;

use super::{ProjectContext, emit_json};
use crate::cli::OutputFormat;
use crate::render;

pub struct ReportArgs {
    pub kind: ReportKind,
    pub region: Option<String>,
    pub product_type: Option<String>,
    pub exchange: Option<String>,
    pub days: Option<u32>,
    pub format: OutputFormat,
}

pub async fn execute(project_dir: &Path, args: ReportArgs) -> anyhow::Result<bool> {
    let ctx = ProjectContext::load(project_dir)?;
    let store = ctx.run_store()?;

    let filter = RollupFilter {
        region: args.region,
        product_type: args.product_type,
        exchange: args.exchange,
        since: args
            .days
            .map(|days| Utc::now() - Duration::days(i64::from(days))),
    };
    let report = build_report(&store, args.kind, &filter).await?;

    match args.format {
        OutputFormat::Json => emit_json(&report, None)?,
        OutputFormat::Table => {
            println!("📊 {} report ({} rows)", report.kind, report.rows.len());
            println!("{}", render::report_table(&report));
        }
    }
    Ok(true)
}
