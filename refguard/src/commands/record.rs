// refguard/src/commands/record.rs
//
// USE CASE: Validate a single instrument, looked up by its record key.

use std::path::Path;

use super::ProjectContext;
use super::validate::print_result;
use crate::cli::OutputFormat;

pub struct RecordArgs<'a> {
    pub record_key: &'a str,
    /// (product type, exchange) when the lookup is restricted to one dataset
    pub scope: Option<(&'a str, &'a str)>,
    pub custom: Option<&'a str>,
    pub format: OutputFormat,
    pub output: Option<&'a Path>,
}

pub async fn execute(project_dir: &Path, args: RecordArgs<'_>) -> anyhow::Result<bool> {
    let ctx = ProjectContext::load(project_dir)?;
    let service = ctx.service()?;

    if args.format == OutputFormat::Table {
        println!(
            "🔎 Looking up {} = {}",
            ctx.config.record_key_column, args.record_key
        );
    }

    let result = match args.scope {
        Some((product_type, exchange)) => {
            service
                .validate_record_in(product_type, exchange, args.record_key, args.custom)
                .await?
        }
        None => service.validate_record(args.record_key, args.custom).await?,
    };

    if args.format == OutputFormat::Table {
        println!("   Found on {}", result.exchange);
    }
    print_result(&result, args.format, args.output)?;
    Ok(result.success)
}
