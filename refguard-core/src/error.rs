// refguard-core/src/error.rs

use std::time::Duration;

use crate::domain::error::DomainError;
use crate::domain::run::ValidationRunResult;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefGuardError {
    // --- DOMAIN ERRORS (rule files, names, lookups) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE ERRORS (IO, Parsing, DuckDB) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- DATASET UNREACHABLE (retryable) ---
    #[error("Dataset for {product_type}/{exchange} could not be loaded: {reason}")]
    DataSource {
        product_type: String,
        exchange: String,
        reason: String,
    },

    // --- VALIDATION RAN, BUT THE RUN WAS NOT STORED ---
    #[error("Validation computed but not recorded: {reason}")]
    NotRecorded {
        result: Box<ValidationRunResult>,
        reason: String,
    },

    #[error("Validation aborted after {0:?}")]
    Timeout(Duration),

    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl RefGuardError {
    /// The caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RefGuardError::DataSource { .. }
                | RefGuardError::Timeout(_)
                | RefGuardError::NotRecorded { .. }
        )
    }

    /// The request itself (or the rule files it points to) is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            RefGuardError::Domain(e) => e.is_client_error(),
            _ => false,
        }
    }

    /// The validation result that was computed before persistence failed, if any.
    pub fn unrecorded_result(&self) -> Option<&ValidationRunResult> {
        match self {
            RefGuardError::NotRecorded { result, .. } => Some(result),
            _ => None,
        }
    }
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for RefGuardError {
    fn from(err: std::io::Error) -> Self {
        RefGuardError::Infrastructure(InfrastructureError::Io(err))
    }
}
