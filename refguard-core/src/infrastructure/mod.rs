// refguard-core/src/infrastructure/mod.rs

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod fs;

pub use adapters::duckdb::{DuckDbDatasetProvider, DuckDbRunStore};
pub use cache::DatasetCache;
pub use config::{YamlRuleStore, load_project_config};
