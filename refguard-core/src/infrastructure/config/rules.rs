// refguard-core/src/infrastructure/config/rules.rs
//
// Rule layout under the rules directory:
//   base.yaml                          -> level 1
//   products/{product}.yaml            -> level 2
//   exchanges/{exchange}.yaml          -> level 3
//   products/{product}/{exchange}.yaml -> level 4
//   custom/{name}.yaml                 -> level 5

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::domain::error::DomainError;
use crate::domain::rules::{RuleDefinition, RuleLevel, parse_rule_file};
use crate::ports::rule_store::{RuleScope, RuleStore};

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

// --- NAME SAFETY ---

/// Rejects names that could escape the rules directory.
pub fn ensure_safe_name(kind: &'static str, value: &str) -> Result<(), DomainError> {
    let unsafe_name = value.trim().is_empty()
        || value.contains(['/', '\\', '\0'])
        || value.contains("..")
        || value.starts_with('.');

    if unsafe_name {
        return Err(DomainError::UnsafeName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

// --- PARSE CACHE ---

#[derive(Debug, Clone)]
struct CachedFile {
    modified: SystemTime,
    len: u64,
    rules: Arc<Vec<RuleDefinition>>,
}

/// Parsed rule files keyed by path.
/// An entry is reused while the file's mtime and size are unchanged.
#[derive(Debug, Default)]
pub struct RuleFileCache {
    entries: Mutex<HashMap<PathBuf, CachedFile>>,
}

impl RuleFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn load(
        &self,
        path: &Path,
        level: RuleLevel,
        source_path: &str,
    ) -> Result<Arc<Vec<RuleDefinition>>, DomainError> {
        let metadata = fs::metadata(path).map_err(|e| io_error(path, e))?;
        let stamp = metadata.modified().ok().map(|m| (m, metadata.len()));

        if let Some((modified, len)) = stamp {
            let entries = self.lock()?;
            if let Some(hit) = entries.get(path)
                && hit.modified == modified
                && hit.len == len
            {
                return Ok(Arc::clone(&hit.rules));
            }
        }

        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let rules = Arc::new(parse_rule_file(&content, level, source_path)?);
        debug!(file = %source_path, rules = rules.len(), "Rule file parsed");

        if let Some((modified, len)) = stamp {
            self.lock()?.insert(
                path.to_path_buf(),
                CachedFile {
                    modified,
                    len,
                    rules: Arc::clone(&rules),
                },
            );
        }
        Ok(rules)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, CachedFile>>, DomainError> {
        self.entries
            .lock()
            .map_err(|_| DomainError::RuleStoreError("Rule cache mutex poisoned".into()))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> DomainError {
    DomainError::RuleStoreError(format!("{}: {}", path.display(), e))
}

// --- STORE ---

/// Outcome of checking one file found under the rules directory.
#[derive(Debug, Clone, Serialize)]
pub struct RuleFileReport {
    pub path: String,
    pub level: Option<RuleLevel>,
    pub rules: usize,
    pub error: Option<String>,
}

impl RuleFileReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// `RuleStore` backed by YAML files on disk.
#[derive(Debug)]
pub struct YamlRuleStore {
    root: PathBuf,
    cache: RuleFileCache,
}

impl YamlRuleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RuleFileCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &RuleFileCache {
        &self.cache
    }

    /// Path of a layer without its extension, or `None` when the scope has no such layer.
    fn layer_stem(
        &self,
        level: RuleLevel,
        scope: &RuleScope,
    ) -> Result<Option<PathBuf>, DomainError> {
        let stem = match level {
            RuleLevel::Global => self.root.join("base"),
            RuleLevel::ProductType => {
                let product = product_dir(&scope.product_type)?;
                self.root.join("products").join(product)
            }
            RuleLevel::Exchange => {
                ensure_safe_name("exchange", &scope.exchange)?;
                self.root.join("exchanges").join(&scope.exchange)
            }
            RuleLevel::ProductExchange => {
                let product = product_dir(&scope.product_type)?;
                ensure_safe_name("exchange", &scope.exchange)?;
                self.root.join("products").join(product).join(&scope.exchange)
            }
            RuleLevel::Custom => match scope.custom_rules.as_deref() {
                Some(name) => {
                    ensure_safe_name("custom rule set", name)?;
                    self.root.join("custom").join(name)
                }
                None => return Ok(None),
            },
        };
        Ok(Some(stem))
    }

    /// `.yaml` wins over `.yml` when both exist.
    fn existing_file(stem: &Path) -> Option<PathBuf> {
        EXTENSIONS.iter().find_map(|ext| {
            let mut candidate = stem.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }

    /// Path relative to the rules directory, with `/` separators.
    fn source_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Every `.yaml`/`.yml` file under the rules directory, sorted.
    pub fn list_rule_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext))
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    /// Parses every rule file on disk and reports the ones that would break a resolution.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn check_all(&self) -> Vec<RuleFileReport> {
        self.list_rule_files()
            .into_iter()
            .map(|path| {
                let source = self.source_path(&path);
                let level = infer_level(&source);
                let outcome = match level {
                    Some(level) => self.cache.load(&path, level, &source).map(|r| r.len()),
                    None => {
                        warn!(file = %source, "File outside the rule layout, ignored by lookups");
                        fs::read_to_string(&path)
                            .map_err(|e| io_error(&path, e))
                            .and_then(|c| parse_rule_file(&c, RuleLevel::Custom, &source))
                            .map(|r| r.len())
                    }
                };
                match outcome {
                    Ok(rules) => RuleFileReport {
                        path: source,
                        level,
                        rules,
                        error: None,
                    },
                    Err(e) => RuleFileReport {
                        path: source,
                        level,
                        rules: 0,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect()
    }
}

impl RuleStore for YamlRuleStore {
    fn get(
        &self,
        level: RuleLevel,
        scope: &RuleScope,
    ) -> Result<Vec<RuleDefinition>, DomainError> {
        let Some(stem) = self.layer_stem(level, scope)? else {
            return Ok(Vec::new());
        };
        let Some(path) = Self::existing_file(&stem) else {
            debug!(level = %level, stem = %stem.display(), "No rule file for layer");
            return Ok(Vec::new());
        };

        let source = self.source_path(&path);
        match self.cache.load(&path, level, &source) {
            Ok(rules) => Ok(rules.as_ref().clone()),
            // Deleted between the existence check and the read
            Err(DomainError::RuleStoreError(_)) if !path.exists() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

fn product_dir(product_type: &str) -> Result<String, DomainError> {
    ensure_safe_name("product type", product_type)?;
    Ok(product_type.to_lowercase())
}

/// Level implied by a path relative to the rules directory.
fn infer_level(source: &str) -> Option<RuleLevel> {
    let without_ext = source
        .strip_suffix(".yaml")
        .or_else(|| source.strip_suffix(".yml"))?;
    let parts: Vec<&str> = without_ext.split('/').collect();
    match parts.as_slice() {
        ["base"] => Some(RuleLevel::Global),
        ["products", _] => Some(RuleLevel::ProductType),
        ["exchanges", _] => Some(RuleLevel::Exchange),
        ["products", _, _] => Some(RuleLevel::ProductExchange),
        ["custom", _] => Some(RuleLevel::Custom),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::{TempDir, tempdir};

    const REGEX: &str = "expect_column_values_to_match_regex";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "base.yaml",
            "rules:\n  - type: not_null\n    column: MasterId\n",
        );
        write(
            dir.path(),
            "products/stock.yaml",
            "rules:\n  - type: regex\n    column: Symbol\n    regex: '^[A-Z0-9]+$'\n",
        );
        write(
            dir.path(),
            "exchanges/HKEX.yml",
            "rules:\n  - type: regex\n    column: Symbol\n    regex: '^[0-9]{4}\\.HK$'\n",
        );
        dir
    }

    fn scope(product: &str, exchange: &str) -> RuleScope {
        RuleScope::new(product, exchange, None)
    }

    #[test]
    fn test_layer_lookup() -> Result<()> {
        let dir = fixture();
        let store = YamlRuleStore::new(dir.path());

        let base = store.get(RuleLevel::Global, &scope("Stock", "HKEX"))?;
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].source_path, "base.yaml");

        // Product type is lower-cased for the lookup
        let product = store.get(RuleLevel::ProductType, &scope("Stock", "HKEX"))?;
        assert_eq!(product[0].rule_type, REGEX);
        assert_eq!(product[0].source_path, "products/stock.yaml");

        let exchange = store.get(RuleLevel::Exchange, &scope("stock", "HKEX"))?;
        assert_eq!(exchange[0].source_path, "exchanges/HKEX.yml");
        assert_eq!(exchange[0].level, RuleLevel::Exchange);
        Ok(())
    }

    #[test]
    fn test_absent_layers_are_empty() -> Result<()> {
        let dir = fixture();
        let store = YamlRuleStore::new(dir.path());
        let s = RuleScope::new("bond", "XTKS", Some("missing"));

        assert!(store.get(RuleLevel::ProductType, &s)?.is_empty());
        assert!(store.get(RuleLevel::ProductExchange, &s)?.is_empty());
        assert!(store.get(RuleLevel::Custom, &s)?.is_empty());
        assert!(store.get(RuleLevel::Custom, &scope("bond", "XTKS"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_yaml_wins_over_yml() -> Result<()> {
        let dir = fixture();
        write(
            dir.path(),
            "custom/audit.yml",
            "rules:\n  - type: unique\n    column: Isin\n",
        );
        write(
            dir.path(),
            "custom/audit.yaml",
            "rules:\n  - type: unique\n    column: MasterId\n",
        );
        let store = YamlRuleStore::new(dir.path());

        let audit = RuleScope::new("stock", "HKEX", Some("audit"));
        let custom = store.get(RuleLevel::Custom, &audit)?;
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].column, "MasterId");
        Ok(())
    }

    #[test]
    fn test_unsafe_names_are_rejected() {
        let dir = fixture();
        let store = YamlRuleStore::new(dir.path());

        for (product, exchange) in [("../etc", "HKEX"), ("stock", "a/b"), ("", "HKEX")] {
            let err = store
                .get(RuleLevel::ProductExchange, &scope(product, exchange))
                .unwrap_err();
            assert!(matches!(err, DomainError::UnsafeName { .. }));
        }

        let err = store
            .get(RuleLevel::Custom, &RuleScope::new("stock", "HKEX", Some("..")))
            .unwrap_err();
        assert!(matches!(err, DomainError::UnsafeName { .. }));
    }

    #[test]
    fn test_malformed_file_fails_fast() {
        let dir = fixture();
        write(dir.path(), "exchanges/XTKS.yaml", "rules:\n  - column: Symbol\n");
        let store = YamlRuleStore::new(dir.path());

        let err = store
            .get(RuleLevel::Exchange, &scope("stock", "XTKS"))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRule { .. }));
    }

    #[test]
    fn test_cache_reuses_unchanged_files() -> Result<()> {
        let dir = fixture();
        let store = YamlRuleStore::new(dir.path());
        let s = scope("stock", "HKEX");

        store.get(RuleLevel::Global, &s)?;
        store.get(RuleLevel::Global, &s)?;
        assert_eq!(store.cache().len(), 1);

        // A size change invalidates the entry even within the same mtime tick
        write(
            dir.path(),
            "base.yaml",
            concat!(
                "rules:\n",
                "  - type: not_null\n    column: MasterId\n",
                "  - type: unique\n    column: MasterId\n",
            ),
        );
        assert_eq!(store.get(RuleLevel::Global, &s)?.len(), 2);

        store.cache().clear();
        assert!(store.cache().is_empty());
        Ok(())
    }

    #[test]
    fn test_check_all_reports_every_file() {
        let dir = fixture();
        write(dir.path(), "custom/broken.yaml", "rules: [oops");
        write(dir.path(), "notes/readme.yaml", "");
        let store = YamlRuleStore::new(dir.path());

        let reports = store.check_all();
        assert_eq!(reports.len(), 5);

        let broken = reports.iter().find(|r| r.path == "custom/broken.yaml").unwrap();
        assert!(!broken.is_ok());
        assert_eq!(broken.level, Some(RuleLevel::Custom));

        let stray = reports.iter().find(|r| r.path == "notes/readme.yaml").unwrap();
        assert!(stray.is_ok());
        assert_eq!(stray.level, None);

        assert_eq!(reports.iter().filter(|r| r.is_ok()).count(), 4);
    }

    #[test]
    fn test_infer_level() {
        assert_eq!(infer_level("base.yaml"), Some(RuleLevel::Global));
        assert_eq!(infer_level("products/stock.yml"), Some(RuleLevel::ProductType));
        assert_eq!(infer_level("products/stock/HKEX.yaml"), Some(RuleLevel::ProductExchange));
        assert_eq!(infer_level("custom/a/b.yaml"), None);
        assert_eq!(infer_level("base.json"), None);
    }
}
