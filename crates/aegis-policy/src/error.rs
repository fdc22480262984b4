// error.rs — Error types for the policy subsystem.
//
// `PolicyError` covers the engine as a whole: a missing or unreadable policy
// directory is fatal at startup, while `LoadError` describes why a single
// document was rejected. A bad document never takes down its neighbours.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single policy document could not be published into the store.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read from disk.
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),

    /// The file is not valid YAML, or does not have the document shape.
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but breaks a structural invariant.
    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// Errors that can occur during policy engine operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The configured policy directory does not exist.
    #[error("policies directory does not exist: {}", path.display())]
    DirectoryMissing { path: PathBuf },

    /// The policy directory exists but cannot be listed.
    #[error("failed to read policies directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single policy file failed to load.
    #[error("failed to load policy file {}: {source}", path.display())]
    Load { path: PathBuf, source: LoadError },

    /// The filesystem notification backend failed.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl PolicyError {
    /// True for errors that must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PolicyError::DirectoryMissing { .. } | PolicyError::DirectoryUnreadable { .. }
        )
    }
}
