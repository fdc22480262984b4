// log.rs — Append-only, hash-chained JSONL audit log.
//
// One JSON object per line. Each event's `previous_hash` is the SHA-256 of
// the previous *line* as written, so inserting, deleting or editing a line
// breaks the chain at that point. Reopening an existing log recovers the hash
// of its last line and continues the chain.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditRecord};
use crate::hasher;

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written; becomes the next event's `previous_hash`.
    last_hash: Option<String>,
}

impl AuditLog {
    /// Open (or create) an audit log, creating its parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source| AuditError::OpenFailed {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_failed)?;
        }

        let last_hash = if path.exists() {
            last_line(&path)?.map(|line| hasher::hash_str(&line))
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    /// Append a record under `trace_id`. Returns the event as written.
    pub fn append(&mut self, trace_id: Uuid, record: AuditRecord) -> Result<AuditEvent, AuditError> {
        let mut event = AuditEvent::new(trace_id, record);
        event.previous_hash = self.last_hash.clone();

        let line = serde_json::to_string(&event)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        // Only advance the chain once the line is on its way to disk.
        self.last_hash = Some(hasher::hash_str(&line));
        Ok(event)
    }

    /// Read every event from a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        lines(path.as_ref())?
            .into_iter()
            .map(|(_, line)| serde_json::from_str(&line).map_err(AuditError::from))
            .collect()
    }

    /// Verify the hash chain of a log file.
    ///
    /// Returns the number of events checked, or `IntegrityViolation` naming
    /// the first line whose `previous_hash` does not match.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut expected: Option<String> = None;
        let mut count = 0;

        for (line_no, line) in lines(path.as_ref())? {
            let event: AuditEvent = serde_json::from_str(&line)?;
            if event.previous_hash != expected {
                return Err(AuditError::IntegrityViolation {
                    line: line_no,
                    expected: expected.unwrap_or_else(|| "none".to_string()),
                    actual: event.previous_hash.unwrap_or_else(|| "none".to_string()),
                });
            }
            // Hash the raw line, not a re-serialization: field order must not matter.
            expected = Some(hasher::hash_str(&line));
            count += 1;
        }

        Ok(count)
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blank lines of a file with their 1-based line numbers.
fn lines(path: &Path) -> Result<Vec<(usize, String)>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if !line.trim().is_empty() {
            out.push((i + 1, line));
        }
    }
    Ok(out)
}

fn last_line(path: &Path) -> Result<Option<String>, AuditError> {
    Ok(lines(path)?.pop().map(|(_, line)| line))
}
