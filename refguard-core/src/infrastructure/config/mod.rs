// refguard-core/src/infrastructure/config/mod.rs

pub mod project;
pub mod rules;

pub use crate::domain::project::ProjectConfig;
pub use project::load_project_config;
pub use rules::{RuleFileCache, RuleFileReport, YamlRuleStore};
