// refguard/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use refguard_core::application::ReportKind;

#[derive(Parser)]
#[command(name = "refguard")]
#[command(about = "Layered data-quality rules for instrument reference data")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project directory (holds refguard.yaml)
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🧩 Shows the merged rule set for a product type and exchange
    Resolve {
        #[arg(long, short = 'p')]
        product_type: String,

        #[arg(long, short = 'e')]
        exchange: String,

        /// Custom rule set (rules/custom/<name>.yaml)
        #[arg(long)]
        custom: Option<String>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// ✅ Validates one dataset and records the run
    Validate {
        #[arg(long, short = 'p')]
        product_type: String,

        #[arg(long, short = 'e')]
        exchange: String,

        /// Region label stored with the run (default: project default-region)
        #[arg(long, short = 'r')]
        region: Option<String>,

        #[arg(long)]
        custom: Option<String>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Also write the JSON result to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// 🔎 Validates a single instrument, looked up by record key
    Record {
        /// Value of the project's record-key-column (ex: MasterId)
        record_key: String,

        /// Restrict the lookup to one product type (requires --exchange)
        #[arg(long, short = 'p', requires = "exchange")]
        product_type: Option<String>,

        #[arg(long, short = 'e', requires = "product_type")]
        exchange: Option<String>,

        #[arg(long)]
        custom: Option<String>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// 🚀 Validates every target of the project in parallel
    Batch {
        /// Parallel passes (default: project workers)
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// 📊 Success rates over recorded runs (trend | heatmap | columns)
    Report {
        kind: ReportKind,

        #[arg(long, short = 'r')]
        region: Option<String>,

        #[arg(long, short = 'p')]
        product_type: Option<String>,

        #[arg(long, short = 'e')]
        exchange: Option<String>,

        /// Only runs from the last N days
        #[arg(long)]
        days: Option<u32>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// 🧪 Parses every rule file and reports the broken ones
    CheckRules {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// 🗂️ Lists recorded runs, or shows one run in full
    Runs {
        /// Show this run (results and provenance)
        #[arg(long)]
        run_id: Option<String>,

        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}
