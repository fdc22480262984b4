// loader.rs — Policy directory loading and validation.
//
// Every `.yaml` / `.yml` file in the policy directory is one document. Files
// are loaded independently: a broken file is logged and skipped, and on reload
// a broken file leaves its last good entry in place.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, PolicyError};
use crate::model::Policy;
use crate::store::PolicyStore;

/// File extensions recognized as policy documents.
pub const POLICY_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Outcome of loading a whole directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Sources published into the store.
    pub loaded: Vec<String>,
    /// Files that were skipped, with the reason.
    pub failed: Vec<(PathBuf, LoadError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// True if `path` names a policy document (by extension).
pub fn is_policy_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| POLICY_EXTENSIONS.contains(&ext))
}

/// The store key for a policy file.
pub fn source_id(path: &Path) -> String {
    path.display().to_string()
}

/// Read, parse and validate a single policy file.
pub fn load_file(path: &Path) -> Result<Policy, LoadError> {
    let text = fs::read_to_string(path)?;
    Policy::from_yaml(source_id(path), &text)
}

/// List policy files in `dir`, sorted by file name. Subdirectories are skipped.
pub fn policy_files(dir: &Path) -> Result<Vec<PathBuf>, PolicyError> {
    if !dir.exists() {
        return Err(PolicyError::DirectoryMissing {
            path: dir.to_path_buf(),
        });
    }
    let unreadable = |source| PolicyError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_file() && is_policy_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load a single file into the store.
///
/// The store is only touched after the document validates, so a failed
/// reload leaves the previous entry intact.
pub fn reload_file(path: &Path, store: &PolicyStore) -> Result<(), PolicyError> {
    let policy = load_file(path).map_err(|source| PolicyError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let version = policy.version.clone();
    let replaced = store.insert(policy);
    tracing::info!(
        source = %path.display(),
        version = %version,
        replaced = replaced.is_some(),
        "Loaded policy file"
    );
    Ok(())
}

/// Load every policy file in `dir` into the store.
///
/// Only a missing or unreadable directory is an error; per-file failures are
/// logged and collected in the report.
pub fn load_dir(dir: &Path, store: &PolicyStore) -> Result<LoadReport, PolicyError> {
    let mut report = LoadReport::default();
    for path in policy_files(dir)? {
        match reload_file(&path, store) {
            Ok(()) => report.loaded.push(source_id(&path)),
            Err(PolicyError::Load { path, source }) => {
                tracing::warn!(
                    source = %path.display(),
                    error = %source,
                    "Failed to load policy file"
                );
                report.failed.push((path, source));
            }
            Err(other) => return Err(other),
        }
    }
    Ok(report)
}
