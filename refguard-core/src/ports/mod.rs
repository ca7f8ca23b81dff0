// refguard-core/src/ports/mod.rs
//
// What the engine needs from the outside world, without knowing how it is done.
// Rule files may live on disk or in a database, datasets in CSV files or a
// warehouse, runs in DuckDB or elsewhere: the application only sees these traits.

pub mod dataset;
pub mod rule_store;
pub mod run_store;

pub use dataset::DatasetProvider;
pub use rule_store::{RuleScope, RuleStore};
pub use run_store::RunStore;
