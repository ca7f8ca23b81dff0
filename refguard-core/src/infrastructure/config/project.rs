// refguard-core/src/infrastructure/config/project.rs

use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::project::configuration::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;

const CONFIG_CANDIDATES: [&str; 2] = ["refguard.yaml", "refguard_project_conf.yaml"];

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    // 2. Chargement YAML
    let mut config: ProjectConfig = load_fragment(&config_path)?;

    // 3. Override via variables d'environnement (pattern 'Layering')
    // REFGUARD_WORKERS=8 refguard batch
    apply_env_overrides(&mut config);

    // 4. Fail-fast : une config invalide n'atteint jamais le moteur
    config.validate().map_err(|e| {
        InfrastructureError::ConfigError(format!("{}: {}", config_path.display(), e))
    })?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CONFIG_CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CONFIG_CANDIDATES
    )))
}

/// Loads a typed YAML document from disk.
pub(crate) fn load_fragment<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        InfrastructureError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut ProjectConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Env layering, with the lookup injected so tests don't touch the process environment.
fn apply_overrides<F>(config: &mut ProjectConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("REFGUARD_DATABASE") {
        info!(old = ?config.database, new = ?val, "Overriding database via ENV");
        config.database = val;
    }
    if let Some(val) = lookup("REFGUARD_RULES_PATH") {
        info!(old = ?config.rules_path, new = ?val, "Overriding rules path via ENV");
        config.rules_path = val;
    }
    if let Some(val) = lookup("REFGUARD_DATA_PATH") {
        info!(old = ?config.data_path, new = ?val, "Overriding data path via ENV");
        config.data_path = val;
    }
    if let Some(val) = lookup("REFGUARD_WORKERS") {
        match val.parse() {
            Ok(workers) => config.workers = workers,
            Err(_) => warn!(value = %val, "Ignoring non-numeric REFGUARD_WORKERS"),
        }
    }
    if let Some(val) = lookup("REFGUARD_TIMEOUT_SECS") {
        match val.parse() {
            Ok(secs) => config.timeout_secs = secs,
            Err(_) => warn!(value = %val, "Ignoring non-numeric REFGUARD_TIMEOUT_SECS"),
        }
    }
}
