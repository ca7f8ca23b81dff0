// refguard-core/src/application/mod.rs

pub mod batch;
pub mod reporting;
pub mod resolution;
pub mod validation;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI fait `use refguard_core::application::{run_batch, ValidationService};`
// sans connaître la structure interne des fichiers.

pub use batch::{BatchOutcome, run_batch};
pub use reporting::{Report, ReportKind, ReportRow, build_report};
pub use resolution::{load_layers, resolve_rules};
pub use validation::{ValidationRequest, ValidationService};
