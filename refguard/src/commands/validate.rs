// refguard/src/commands/validate.rs
//
// USE CASE: Validate one dataset and record the run.

use std::path::Path;

use refguard_core::application::ValidationRequest;
use refguard_core::domain::run::ValidationRunResult;

use super::{ProjectContext, emit_json, save_json};
use crate::cli::OutputFormat;
use crate::render;

pub struct ValidateArgs<'a> {
    pub product_type: &'a str,
    pub exchange: &'a str,
    pub region: Option<&'a str>,
    pub custom: Option<&'a str>,
    pub format: OutputFormat,
    pub output: Option<&'a Path>,
}

pub async fn execute(project_dir: &Path, args: ValidateArgs<'_>) -> anyhow::Result<bool> {
    let start = std::time::Instant::now();
    let ctx = ProjectContext::load(project_dir)?;
    let service = ctx.service()?;

    let mut request =
        ValidationRequest::new(args.product_type, args.exchange).with_custom_rules(args.custom);
    if let Some(region) = args.region {
        request = request.with_region(region);
    }

    if args.format == OutputFormat::Table {
        println!(
            "✅ Validating {} on {} (project {} v{})",
            args.product_type, args.exchange, ctx.config.name, ctx.config.version
        );
    }

    let result = service.execute_validation(&request).await?;
    print_result(&result, args.format, args.output)?;
    if args.format == OutputFormat::Table {
        println!("   Finished in {:.2?}", start.elapsed());
    }
    Ok(result.success)
}

/// Shared by `validate` and `record`.
pub fn print_result(
    result: &ValidationRunResult,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => emit_json(result, output)?,
        OutputFormat::Table => {
            println!("{}", render::results_table(result));
            if result.success {
                println!(
                    "\n✨ SUCCESS! {}/{} expectations passed.",
                    result.successful_expectations, result.total_expectations
                );
            } else {
                eprintln!(
                    "\n❌ FAILURE. {} of {} expectations failed.",
                    result.failed_expectations, result.total_expectations
                );
            }
            save_json(&serde_json::to_string_pretty(result)?, output)?;
        }
    }
    Ok(())
}
