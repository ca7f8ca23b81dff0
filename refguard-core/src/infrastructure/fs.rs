// refguard-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes a report file so that readers see either the previous content or the new one.
///
/// The content goes to a temporary file next to `path`, which is then renamed over it.
/// Missing parent directories are created.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // Same directory as the target, so the rename never crosses filesystems
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_ref())?;
    temp_file.flush()?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Project-relative paths from the config are anchored at the project directory.
/// Absolute paths and the `:memory:` database are returned unchanged.
pub fn resolve_project_path(project_dir: &Path, configured: &str) -> PathBuf {
    let candidate = Path::new(configured);
    if configured == ":memory:" || candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        project_dir.join(candidate)
    }
}
