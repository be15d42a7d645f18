//! Debounced file watcher for the watched root
//!
//! Uses the `notify` crate to watch for version file changes and reconcile
//! the registry with disk once a directory has gone quiet.
//!
//! # Features
//!
//! - Recursive directory watching (hidden and build directories skipped)
//! - Two-stage debouncing: `notify-debouncer-mini` collapses per-path bursts,
//!   then a per-directory deadline is refreshed on every event
//! - Exactly one rescan and one `file_changed` per settled directory batch
//! - Rescans wait behind in-flight commands on the same component
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌────────────────┐     ┌──────────────┐
//! │   notify    │────>│  debouncer  │────>│ PendingBatches │────>│ resync + hub │
//! │   watcher   │     │ (coalesce)  │     │  (debounce)    │     │  broadcast   │
//! └─────────────┘     └─────────────┘     └────────────────┘     └──────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use crate::error::{EngineError, Result};
use crate::fs_utils::is_temp_file;
use crate::scanner::{parse_version_filename, should_visit_dir};

use super::events;
use super::state::EngineState;

/// Events waiting for their directory to go quiet
#[derive(Debug)]
pub struct PendingBatches {
    window: Duration,
    batches: BTreeMap<PathBuf, Batch>,
}

#[derive(Debug)]
struct Batch {
    deadline: Instant,
    paths: BTreeSet<PathBuf>,
}

impl PendingBatches {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            batches: BTreeMap::new(),
        }
    }

    /// Add a changed path, pushing its directory's deadline out by one window
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let deadline = now + self.window;
        let batch = self.batches.entry(directory).or_insert_with(|| Batch {
            deadline,
            paths: BTreeSet::new(),
        });
        batch.deadline = deadline;
        batch.paths.insert(path);
    }

    /// Earliest deadline among pending directories
    pub fn next_deadline(&self) -> Option<Instant> {
        self.batches.values().map(|b| b.deadline).min()
    }

    /// Remove and return every directory whose deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Vec<(PathBuf, Vec<PathBuf>)> {
        let due: Vec<PathBuf> = self
            .batches
            .iter()
            .filter(|(_, b)| b.deadline <= now)
            .map(|(dir, _)| dir.clone())
            .collect();
        due.into_iter()
            .filter_map(|dir| {
                self.batches
                    .remove(&dir)
                    .map(|b| (dir, b.paths.into_iter().collect()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Check if a path is a version file the watcher cares about
pub fn should_watch_path(path: &Path, root: &Path, extensions: &[String]) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    if is_temp_file(path) {
        return false;
    }

    // Every directory between the root and the file must be visitable
    let mut dir = rel.parent();
    while let Some(d) = dir {
        if d.as_os_str().is_empty() {
            break;
        }
        if !should_visit_dir(d) {
            return false;
        }
        dir = d.parent();
    }

    match parse_version_filename(path) {
        Some(parsed) => extensions.iter().any(|e| e == &parsed.extension),
        None => false,
    }
}

/// File system watcher feeding the engine state
pub struct FileWatcher {
    state: Arc<EngineState>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl FileWatcher {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self {
            state,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching the state's root
    ///
    /// Must be called from inside a tokio runtime. The OS watch is registered
    /// before this returns, so changes made afterwards are never missed.
    pub fn start(&self) -> Result<WatcherHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(self.handle());
        }

        let root = self.state.root().to_path_buf();
        let watcher_config = &self.state.config().watcher;
        let extensions = watcher_config.extensions.clone();
        let window = watcher_config.debounce();

        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(watcher_config.coalesce(), move |result: DebounceEventResult| {
            // Receiver gone means the watcher task already exited
            let _ = tx.send(result);
        })
        .map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            EngineError::fs(&root, e)
        })?;

        if let Err(e) = debouncer.watcher().watch(&root, RecursiveMode::Recursive) {
            self.running.store(false, Ordering::SeqCst);
            return Err(EngineError::fs(&root, e));
        }
        tracing::info!("[WATCHER] Watching {} ({}ms debounce)", root.display(), window.as_millis());

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            // Dropping the debouncer unregisters the OS watch
            let _debouncer = debouncer;
            let mut pending = PendingBatches::new(window);

            while running.load(Ordering::SeqCst) {
                let deadline = pending.next_deadline();
                tokio::select! {
                    _ = shutdown.notified() => break,

                    received = rx.recv() => match received {
                        Some(Ok(batch)) => {
                            tracing::debug!("[WATCHER] Received {} raw events", batch.len());
                            let now = Instant::now();
                            for event in batch {
                                if !matches!(event.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous) {
                                    continue;
                                }
                                if should_watch_path(&event.path, &root, &extensions) {
                                    tracing::debug!("[WATCHER] Accepted {:?}", event.path);
                                    pending.record(event.path, now);
                                }
                            }
                        }
                        Some(Err(e)) => tracing::error!("[WATCHER] Watch error: {:?}", e),
                        None => break,
                    },

                    _ = sleep_until(deadline) => {
                        for (directory, paths) in pending.take_due(Instant::now()) {
                            settle_directory(&state, &directory, &paths).await;
                        }
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            tracing::info!("[WATCHER] Stopped");
        });

        Ok(self.handle())
    }

    fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            running: Arc::clone(&self.running),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Reconcile one quiet directory and announce the batch
///
/// Holds the locks of every affected component for the duration of the
/// rescan, so a command in flight finishes first.
async fn settle_directory(state: &EngineState, directory: &Path, paths: &[PathBuf]) {
    let names: BTreeSet<String> = paths
        .iter()
        .filter_map(|p| parse_version_filename(p))
        .map(|p| p.component)
        .collect();

    // BTreeSet order keeps lock acquisition consistent across batches
    let handles: Vec<_> = names.iter().map(|n| state.locks().handle(n)).collect();
    let mut guards = Vec::with_capacity(handles.len());
    for handle in &handles {
        guards.push(handle.lock().await);
    }

    for name in &names {
        match state.resync_component(directory, name).await {
            Ok(diff) if !diff.is_empty() => {
                tracing::info!("[WATCHER] {} changed on disk: {:?}", name, diff);
            }
            Ok(_) => tracing::debug!("[WATCHER] {} unchanged", name),
            Err(e) => tracing::error!("[WATCHER] Failed to resync {}: {}", name, e),
        }
    }
    drop(guards);

    state.broadcast(&events::file_changed(state.root(), directory, &names, paths));
}

/// Handle for controlling a running watcher
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl WatcherHandle {
    /// Stop the watcher
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.shutdown.notify_one();
        }
    }

    /// Check if the watcher is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
