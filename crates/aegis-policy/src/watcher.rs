// watcher.rs — Hot-reload of the policy directory.
//
// A `notify` watcher forwards raw filesystem events into a channel. A single
// tokio task drains that channel and handles events strictly in order, so
// two reloads never race.
//
// Editors rarely write a file in one event (truncate + write, or write to a
// temp file and rename). Events are therefore debounced per path: each event
// pushes the path's deadline out by the quiet window, and the *last* event
// kind decides what happens once the path goes quiet.
//
//   create / modify / rename-to   → reload the file (keep old entry on failure)
//   remove / rename-from          → drop the store entry
//
// A reload whose file no longer exists when the window closes is a removal.
//
// The task stops when `shutdown()` is called, or quietly when the event
// channel closes (no further reloads; edits then need a restart).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::PolicyEngine;
use crate::error::PolicyError;
use crate::loader;

/// Default quiet window before a changed file is reloaded.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// What to do with a path once it has been quiet for the debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Reload,
    Remove,
}

/// Handle to the background hot-reload task.
///
/// Dropping the handle drops the OS watcher, which closes the event channel
/// and lets the task exit on its own. Call [`PolicyWatcher::shutdown`] to stop
/// it explicitly and wait for it.
pub struct PolicyWatcher {
    _watcher: RecommendedWatcher,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl fmt::Debug for PolicyWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyWatcher")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl PolicyWatcher {
    /// Start watching `dir` and reconciling changes into `engine`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        engine: Arc<PolicyEngine>,
        dir: impl AsRef<Path>,
        debounce: Duration,
    ) -> Result<Self, PolicyError> {
        let dir = dir.as_ref();
        let dir = dir
            .canonicalize()
            .map_err(|_| PolicyError::DirectoryMissing {
                path: dir.to_path_buf(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone only after shutdown; nothing left to notify.
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(engine, rx, shutdown_rx, debounce));

        tracing::info!(
            dir = %dir.display(),
            debounce_ms = debounce.as_millis() as u64,
            "Watching policy directory for changes"
        );

        Ok(Self {
            _watcher: watcher,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// True once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the watcher and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Policy watcher task ended abnormally");
        }
    }
}

async fn run(
    engine: Arc<PolicyEngine>,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown: oneshot::Receiver<()>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, (Change, Instant)> = HashMap::new();

    loop {
        let next_due = pending.values().map(|(_, due)| *due).min();

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Policy watcher stopped");
                break;
            }
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    for (path, change) in classify(&event) {
                        if loader::is_policy_file(&path) {
                            pending.insert(path, (change, Instant::now() + debounce));
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "File watcher error");
                }
                None => {
                    tracing::debug!("Policy watcher channel closed; hot-reload disabled");
                    break;
                }
            },
            _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, at))| *at <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    if let Some((change, _)) = pending.remove(&path) {
                        apply(&engine, &path, change);
                    }
                }
            }
        }
    }
}

fn apply(engine: &PolicyEngine, path: &Path, change: Change) {
    // A trailing modify can arrive for a file that is already gone.
    let change = match change {
        Change::Reload if !path.exists() => Change::Remove,
        other => other,
    };
    match change {
        Change::Reload => match engine.reload_source(path) {
            Ok(()) => tracing::info!(source = %path.display(), "Hot-reloaded policy file"),
            Err(e) => tracing::warn!(error = %e, "Failed to reload policy file; keeping previous version"),
        },
        Change::Remove => {
            engine.remove_source(path);
        }
    }
}

/// Map a raw notify event onto per-path changes.
fn classify(event: &Event) -> Vec<(PathBuf, Change)> {
    let all = |change: Change| -> Vec<(PathBuf, Change)> {
        event.paths.iter().map(|p| (p.clone(), change)).collect()
    };
    match &event.kind {
        EventKind::Create(_) => all(Change::Reload),
        EventKind::Remove(_) => all(Change::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(Change::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(Change::Reload),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), Change::Remove));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to.clone(), Change::Reload));
            }
            changes
        }
        // Backends that cannot tell which side of a rename this is.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let change = if p.exists() { Change::Reload } else { Change::Remove };
                (p.clone(), change)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => all(Change::Reload),
    }
}
