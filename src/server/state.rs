//! Shared engine state
//!
//! `EngineState` owns the Registry for one watched root, the per-component
//! lock table that serializes mutations, and the broadcast channel the hub
//! fans out to every connected client.
//!
//! # Locking Order
//!
//! 1. Component lock (`ComponentLocks`, async, held across a whole command)
//! 2. `registry` (parking_lot RwLock, never held across an await)
//!
//! Never hold the registry lock while performing I/O. Instead:
//! - Read a snapshot under lock
//! - Release lock
//! - Perform I/O on the blocking pool
//! - Re-acquire lock to apply the result

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::codegen::write_index;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fs_utils::canonical;
use crate::registry::{diff_component, Component, Registry, RegistryDiff};
use crate::scanner::{scan_component, scan_tree};
use crate::socket_server::protocol::ServerMessage;

use super::events;

/// Capacity of the broadcast channel; lagging clients skip to the newest snapshot
const BROADCAST_CAPACITY: usize = 256;

/// Mutation phase of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentPhase {
    Idle,
    Mutating,
}

/// Per-component async locks
///
/// Held by a component's command worker while a command runs and by the
/// watcher while it rescans, so the two never overlap. Different components
/// never contend.
#[derive(Default)]
pub struct ComponentLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ComponentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a component, created on first use
    pub fn handle(&self, component: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(component.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    pub fn phase(&self, component: &str) -> ComponentPhase {
        let handle = self.locks.lock().get(component).cloned();
        match handle {
            Some(lock) if lock.try_lock().is_err() => ComponentPhase::Mutating,
            _ => ComponentPhase::Idle,
        }
    }
}

/// Run filesystem work on the blocking pool
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::FileSystemFailure {
            path: PathBuf::new(),
            message: format!("blocking task failed: {}", e),
        })?
}

/// State shared by the watcher, the command processor and the hub
pub struct EngineState {
    /// Canonical watched root (immutable after creation)
    root: PathBuf,
    config: EngineConfig,
    registry: RwLock<Registry>,
    locks: ComponentLocks,
    events: broadcast::Sender<String>,
}

impl EngineState {
    /// Create an empty state for a watched root
    pub fn new(root: &Path, config: EngineConfig) -> Result<Self> {
        let root = canonical(root).map_err(|e| EngineError::fs(root, e))?;
        if !root.is_dir() {
            return Err(EngineError::fs(&root, "watched root is not a directory"));
        }
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            root,
            config,
            registry: RwLock::new(Registry::new()),
            locks: ComponentLocks::new(),
            events,
        })
    }

    /// Create the state, scan the whole root, and bring every index up to date
    pub async fn open(root: &Path, config: EngineConfig) -> Result<Arc<Self>> {
        let state = Arc::new(Self::new(root, config)?);
        state.rebuild().await?;
        Ok(state)
    }

    /// Full rescan of the watched root
    pub async fn rebuild(&self) -> Result<()> {
        let root = self.root.clone();
        let extensions = self.config.watcher.extensions.clone();
        let report = blocking(move || scan_tree(&root, &extensions)).await?;

        let components: Vec<Component> = report.registry.components().cloned().collect();
        let regenerated = blocking(move || {
            let mut written = 0;
            for component in &components {
                match write_index(component) {
                    Ok(true) => written += 1,
                    Ok(false) => {}
                    Err(e) => tracing::error!("{}", e),
                }
            }
            Ok(written)
        })
        .await?;

        tracing::info!(
            "Tracking {} components under {} ({} indexes regenerated)",
            report.registry.len(),
            self.root.display(),
            regenerated
        );
        *self.registry.write() = report.registry;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locks(&self) -> &ComponentLocks {
        &self.locks
    }

    /// Clone of the current registry
    pub fn registry(&self) -> Registry {
        self.registry.read().clone()
    }

    /// Snapshot of one tracked component
    pub fn component(&self, name: &str) -> Result<Component> {
        self.registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ComponentNotFound {
                component: name.to_string(),
            })
    }

    /// Resolve a client-supplied path against the root, refusing escapes
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = canonical(&joined).map_err(|_| EngineError::ComponentNotFound {
            component: raw.to_string(),
        })?;
        if !resolved.starts_with(&self.root) {
            return Err(EngineError::fs(resolved, "path is outside the watched root"));
        }
        Ok(resolved)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    /// Send a message to every connected client
    pub fn broadcast(&self, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => {
                // No receivers is fine: nobody is connected yet
                let _ = self.events.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize broadcast: {}", e),
        }
    }

    /// Current `components` listing
    pub fn components_message(&self) -> ServerMessage {
        events::components(&self.root, &self.registry.read())
    }

    pub fn broadcast_components(&self) {
        let message = self.components_message();
        self.broadcast(&message);
    }

    /// Rescan one component in `directory` and reconcile the registry with it
    ///
    /// Regenerates the index and broadcasts a snapshot only when the version
    /// set changed (or the index is missing). Callers must hold the
    /// component's lock. On error the registry is left untouched.
    pub async fn resync_component(&self, directory: &Path, name: &str) -> Result<RegistryDiff> {
        let previous = self.registry.read().get(name).cloned();
        if let Some(prev) = &previous {
            if prev.directory != directory {
                tracing::debug!(
                    "Ignoring {} in {}: already tracked in {}",
                    name,
                    directory.display(),
                    prev.directory.display()
                );
                return Ok(RegistryDiff::default());
            }
        }

        let dir = directory.to_path_buf();
        let component_name = name.to_string();
        let extensions = self.config.watcher.extensions.clone();
        let scanned = blocking(move || scan_component(&dir, &component_name, &extensions)).await?;

        let diff = diff_component(previous.as_ref(), scanned.as_ref());
        if let Some(component) = &scanned {
            if !diff.is_empty() || !component.generated_index_path.exists() {
                let component = component.clone();
                blocking(move || write_index(&component)).await?;
            }
        }

        if diff.is_empty() && previous.is_some() == scanned.is_some() {
            return Ok(diff);
        }

        if scanned.is_none() {
            tracing::info!("Component {} no longer has version files, dropping it", name);
        }
        self.registry.write().reconcile(name, scanned);
        self.broadcast_components();
        Ok(diff)
    }
}
