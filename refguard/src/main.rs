// refguard/src/main.rs

mod cli;
mod commands;
mod render;

use clap::Parser;
use miette::{Diagnostic, GraphicalReportHandler};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{batch, check_rules, record, report, resolve, runs, validate};
use refguard_core::RefGuardError;
use refguard_core::domain::DomainError;
use refguard_core::infrastructure::error::InfrastructureError;

#[tokio::main]
async fn main() {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug refguard validate ... pour voir les détails.
    // stderr only: stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        // Exit with error code for CI/CD
        Ok(false) => std::process::exit(1),
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let project_dir = cli.project_dir.as_path();

    match cli.command {
        // --- USE CASE: RESOLVE ---
        Commands::Resolve {
            product_type,
            exchange,
            custom,
            format,
        } => resolve::execute(
            project_dir,
            &product_type,
            &exchange,
            custom.as_deref(),
            format,
        ),

        // --- USE CASE: VALIDATE ONE DATASET ---
        Commands::Validate {
            product_type,
            exchange,
            region,
            custom,
            format,
            output,
        } => {
            let args = validate::ValidateArgs {
                product_type: &product_type,
                exchange: &exchange,
                region: region.as_deref(),
                custom: custom.as_deref(),
                format,
                output: output.as_deref(),
            };
            validate::execute(project_dir, args).await
        }

        // --- USE CASE: VALIDATE ONE RECORD ---
        Commands::Record {
            record_key,
            product_type,
            exchange,
            custom,
            format,
            output,
        } => {
            let args = record::RecordArgs {
                record_key: &record_key,
                scope: product_type.as_deref().zip(exchange.as_deref()),
                custom: custom.as_deref(),
                format,
                output: output.as_deref(),
            };
            record::execute(project_dir, args).await
        }

        // --- USE CASE: BATCH ---
        Commands::Batch {
            workers,
            format,
            output,
        } => batch::execute(project_dir, workers, format, output.as_deref()).await,

        // --- USE CASE: REPORTS ---
        Commands::Report {
            kind,
            region,
            product_type,
            exchange,
            days,
            format,
        } => {
            let args = report::ReportArgs {
                kind,
                region,
                product_type,
                exchange,
                days,
                format,
            };
            report::execute(project_dir, args).await
        }

        Commands::CheckRules { format } => check_rules::execute(project_dir, format),

        Commands::Runs {
            run_id,
            limit,
            format,
        } => runs::execute(project_dir, run_id.as_deref(), limit, format).await,
    }
}

/// Rule-file and config errors carry a miette diagnostic (code + help); render it when present.
fn report_error(error: &anyhow::Error) {
    eprintln!("\n💥 {:#}", error);

    let diagnostic = error.chain().find_map(diagnostic_of);
    if let Some(diagnostic) = diagnostic {
        let mut rendered = String::new();
        if GraphicalReportHandler::new()
            .render_report(&mut rendered, diagnostic)
            .is_ok()
        {
            eprintln!("{}", rendered);
        }
    }

    if let Some(result) = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RefGuardError>())
        .and_then(RefGuardError::unrecorded_result)
    {
        eprintln!("⚠️  The validation finished but its run could not be stored:");
        eprintln!("{}", render::results_table(result));
    }
}

// RefGuardError wraps transparently, so its domain/infra source never shows up in the chain
type Cause = dyn std::error::Error + 'static;

fn diagnostic_of(cause: &Cause) -> Option<&dyn Diagnostic> {
    if let Some(e) = cause.downcast_ref::<RefGuardError>() {
        return match e {
            RefGuardError::Domain(d) => Some(d),
            RefGuardError::Infrastructure(i) => Some(i),
            _ => None,
        };
    }
    if let Some(e) = cause.downcast_ref::<DomainError>() {
        return Some(e);
    }
    cause
        .downcast_ref::<InfrastructureError>()
        .map(|e| e as &dyn Diagnostic)
}
