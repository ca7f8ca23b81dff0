// refguard-core/src/lib.rs

// 1. Mandatory documentation for production code
#![allow(missing_docs)]

// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// Rule store, dataset provider, run store.
pub mod ports;

// 2. Domain (business core)
// Rule levels, resolver, expectation families, run aggregation.
// Depends on nothing else (no infra, no app).
pub mod domain;

// 3. Infrastructure (Adapters)
// YAML rule files, DuckDB datasets & run store, caches, config files.
// Depends on Domain and Ports.
pub mod infrastructure;

// 4. Application (Use Cases)
// Resolution, validation service, batch runner, reporting.
// Depends on Domain, Infra and Ports.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
// use refguard_core::RefGuardError;
pub use error::RefGuardError;
