// refguard/src/commands/mod.rs

pub mod batch;
pub mod check_rules;
pub mod record;
pub mod report;
pub mod resolve;
pub mod runs;
pub mod validate;

use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use refguard_core::application::ValidationService;
use refguard_core::domain::project::ProjectConfig;
use refguard_core::infrastructure::config::load_project_config;
use refguard_core::infrastructure::fs::{atomic_write, resolve_project_path};
use refguard_core::infrastructure::{DuckDbDatasetProvider, DuckDbRunStore, YamlRuleStore};

/// Config plus the adapters every command builds from it.
pub struct ProjectContext {
    pub config: ProjectConfig,
    pub rules_dir: PathBuf,
    pub data_dir: PathBuf,
    pub database: PathBuf,
}

impl ProjectContext {
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(project_dir).with_context(|| {
            format!(
                "Failed to load project configuration from {:?}",
                project_dir
            )
        })?;
        let ctx = Self {
            rules_dir: resolve_project_path(project_dir, &config.rules_path),
            data_dir: resolve_project_path(project_dir, &config.data_path),
            database: resolve_project_path(project_dir, &config.database),
            config,
        };
        debug!(
            project = %ctx.config.name,
            rules = %ctx.rules_dir.display(),
            data = %ctx.data_dir.display(),
            "Project loaded"
        );
        Ok(ctx)
    }

    pub fn rule_store(&self) -> YamlRuleStore {
        YamlRuleStore::new(&self.rules_dir)
    }

    pub fn run_store(&self) -> anyhow::Result<DuckDbRunStore> {
        if let Some(parent) = self.database.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db_path = self.database.to_string_lossy();
        DuckDbRunStore::open(&db_path)
            .with_context(|| format!("Failed to open the run store at {}", db_path))
    }

    pub fn service(&self) -> anyhow::Result<ValidationService> {
        Ok(ValidationService::new(
            Arc::new(self.rule_store()),
            Arc::new(DuckDbDatasetProvider::new(&self.data_dir)),
            Arc::new(self.run_store()?),
            &self.config,
        ))
    }
}

/// Pretty JSON on stdout, and atomically into `output` when given.
pub fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    save_json(&json, output)
}

pub fn save_json(json: &str, output: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = output {
        atomic_write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("📄 JSON saved to {}", path.display());
    }
    Ok(())
}
