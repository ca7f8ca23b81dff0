// refguard/src/commands/check_rules.rs
//
// USE CASE: Parse every rule file before a run does.

use std::path::Path;

use super::{ProjectContext, emit_json};
use crate::cli::OutputFormat;
use crate::render;

pub fn execute(project_dir: &Path, format: OutputFormat) -> anyhow::Result<bool> {
    let ctx = ProjectContext::load(project_dir)?;
    let reports = ctx.rule_store().check_all();
    let broken = reports.iter().filter(|r| !r.is_ok()).count();

    match format {
        OutputFormat::Json => emit_json(&reports, None)?,
        OutputFormat::Table => {
            println!("🧪 Checking rule files in {}", ctx.rules_dir.display());
            println!("{}", render::check_table(&reports));
            if broken == 0 {
                println!("\n✨ {} rule files OK.", reports.len());
            } else {
                eprintln!("\n❌ {} broken rule files.", broken);
            }
        }
    }
    Ok(broken == 0)
}
