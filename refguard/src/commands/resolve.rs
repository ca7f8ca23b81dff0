// refguard/src/commands/resolve.rs
//
// USE CASE: Show the merged rule set of one (product type, exchange).

use std::path::Path;

use refguard_core::application::resolve_rules;

use super::{ProjectContext, emit_json};
use crate::cli::OutputFormat;
use crate::render;

pub fn execute(
    project_dir: &Path,
    product_type: &str,
    exchange: &str,
    custom: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let ctx = ProjectContext::load(project_dir)?;
    let resolved = resolve_rules(&ctx.rule_store(), product_type, exchange, custom)?;

    match format {
        OutputFormat::Json => emit_json(&resolved.provenance, None)?,
        OutputFormat::Table => {
            println!(
                "🧩 {} rules for {} on {}",
                resolved.len(),
                product_type,
                exchange
            );
            println!("{}", render::rules_table(&resolved));
        }
    }
    Ok(true)
}
