pub mod dataset;
pub mod error;
pub mod expectations;
pub mod project;
pub mod rules;
pub mod run;

// Handy re-exports to keep imports short elsewhere
pub use error::DomainError;
