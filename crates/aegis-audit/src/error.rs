// error.rs — Error types for the audit subsystem.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Opening the log is the only failure that matters at startup; write failures
// at request time are reported to the caller, which logs them and carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file (or its directory).
    #[error("failed to open audit log at {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a record to the log.
    #[error("failed to append audit record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A record could not be serialized, or a stored line is not a record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The hash chain is broken at `line`.
    #[error("integrity check failed at line {line}: expected previous hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
