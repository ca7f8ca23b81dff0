// refguard-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Invalid rule #{index} in '{source_path}': {reason}")]
    #[diagnostic(
        code(refguard::domain::invalid_rule),
        help("Every rule needs at least a 'type' and a 'column'.")
    )]
    InvalidRule {
        source_path: String,
        index: usize,
        reason: String,
    },

    #[error("Rule file '{source_path}' could not be parsed: {reason}")]
    #[diagnostic(
        code(refguard::domain::rule_file),
        help("Check your YAML syntax (indentation, types).")
    )]
    MalformedRuleFile { source_path: String, reason: String },

    #[error("Unsafe {kind} name: '{value}'")]
    #[diagnostic(
        code(refguard::domain::unsafe_name),
        help("Names must be non-empty and cannot contain path separators or '..'.")
    )]
    UnsafeName { kind: &'static str, value: String },

    #[error("No record with {key_column} = '{record_key}' in any configured target")]
    #[diagnostic(code(refguard::domain::record_not_found))]
    RecordNotFound {
        key_column: String,
        record_key: String,
    },

    #[error("Rule store Error: {0}")]
    #[diagnostic(code(refguard::domain::rule_store))]
    RuleStoreError(String),
}

impl DomainError {
    /// Errors caused by the request or by the authored rule files, as opposed to the runtime.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DomainError::RuleStoreError(_))
    }
}
