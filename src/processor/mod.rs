//! Command processor: serialized, all-or-nothing mutations of the version set
//!
//! Each component owns a single-writer queue drained by one worker task.
//! [`CommandProcessor::submit`] enqueues synchronously, so commands for one
//! component run in exactly the order they were submitted; commands for
//! different components run concurrently. While a command runs the worker
//! also holds the component lock, which the watcher waits on before a rescan.
//!
//! A command only acks after its filesystem steps *and* the index
//! regeneration succeeded. Any failure rolls the steps back first, so a
//! client never sees a success that disk does not reflect.

pub mod ops;
pub mod transaction;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{EngineError, Result};
use crate::scanner::parse_version_filename;
use crate::server::state::{blocking, EngineState};
use crate::socket_server::protocol::AckPayload;
use crate::version::{normalize, VersionKey};

use transaction::FsTransaction;

/// One mutating request, however it arrived (websocket or CLI)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewVersion { component: String },
    DuplicateVersion { component: String, version: String },
    DeleteVersion { component: String, version: String },
    RenameVersion { component: String, version: String, new_version: String },
    PromoteVersion { component: String, version: String },
    /// `path` is the component's plain source file, relative to the root or absolute
    InitComponent { path: String },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewVersion { .. } => "new_version",
            Self::DuplicateVersion { .. } => "duplicate_version",
            Self::DeleteVersion { .. } => "delete_version",
            Self::RenameVersion { .. } => "rename_version",
            Self::PromoteVersion { .. } => "promote_version",
            Self::InitComponent { .. } => "init_component",
        }
    }

    /// Name of the component whose lock this command takes
    pub fn target(&self) -> String {
        match self {
            Self::NewVersion { component }
            | Self::DuplicateVersion { component, .. }
            | Self::DeleteVersion { component, .. }
            | Self::RenameVersion { component, .. }
            | Self::PromoteVersion { component, .. } => component.clone(),
            Self::InitComponent { path } => {
                let path = Path::new(path);
                parse_version_filename(path)
                    .map(|p| p.component)
                    .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .unwrap_or_default()
            }
        }
    }
}

fn parse_key(raw: &str) -> Result<VersionKey> {
    normalize(raw).ok_or_else(|| EngineError::InvalidVersionFormat {
        input: raw.to_string(),
    })
}

/// Reply channel for a submitted command
pub type Pending = oneshot::Receiver<Result<AckPayload>>;

struct Job {
    command: Command,
    reply: oneshot::Sender<Result<AckPayload>>,
}

/// Executes commands against the engine state
#[derive(Clone)]
pub struct CommandProcessor {
    state: Arc<EngineState>,
    queues: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>>,
}

impl CommandProcessor {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self {
            state,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Queue a command behind everything already submitted for its component
    ///
    /// Must be called from within a tokio runtime. The command runs even if
    /// the returned receiver is dropped.
    pub fn submit(&self, command: Command) -> Pending {
        let (reply, rx) = oneshot::channel();
        let target = command.target();
        let job = Job { command, reply };

        let mut queues = self.queues.lock();
        let queue = queues
            .entry(target.clone())
            .or_insert_with(|| spawn_worker(Arc::clone(&self.state), target.clone()));
        if let Err(mpsc::error::SendError(job)) = queue.send(job) {
            tracing::warn!("[PROCESSOR] Worker for {} exited, restarting", target);
            let fresh = spawn_worker(Arc::clone(&self.state), target.clone());
            let _ = fresh.send(job);
            queues.insert(target, fresh);
        }
        rx
    }

    /// Run one command to completion
    pub async fn execute(&self, command: Command) -> Result<AckPayload> {
        let target = command.target();
        self.submit(command).await.map_err(|_| EngineError::FileSystemFailure {
            path: target.into(),
            message: "command worker stopped before replying".to_string(),
        })?
    }
}

fn spawn_worker(state: Arc<EngineState>, target: String) -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(async move {
        let runner = Runner { state };
        while let Some(job) = rx.recv().await {
            let result = runner.run(job.command).await;
            // The requester may have gone away; the command still completed
            let _ = job.reply.send(result);
        }
        tracing::debug!("[PROCESSOR] Queue for {} closed", target);
    });
    tx
}

/// Applies commands for one component worker
struct Runner {
    state: Arc<EngineState>,
}

impl Runner {
    async fn run(&self, command: Command) -> Result<AckPayload> {
        let target = command.target();
        let lock = self.state.locks().handle(&target);
        let _guard = lock.lock().await;

        tracing::info!("[PROCESSOR] {} on {}", command.kind(), target);
        let result = self.apply(command).await;
        match &result {
            Ok(ack) => tracing::info!("[PROCESSOR] {}: {}", target, ack.message),
            Err(e) => tracing::warn!("[PROCESSOR] {} failed: {}", target, e),
        }
        result
    }

    async fn apply(&self, command: Command) -> Result<AckPayload> {
        match command {
            Command::NewVersion { component } => {
                let snapshot = self.state.component(&component)?;
                let op_snapshot = snapshot.clone();
                let (key, tx) = blocking(move || ops::new_version(&op_snapshot)).await?;
                self.commit(&snapshot.directory, &snapshot.name, tx).await?;
                Ok(AckPayload::version(key, "created new version"))
            }

            Command::DuplicateVersion { component, version } => {
                let snapshot = self.state.component(&component)?;
                let source = parse_key(&version)?;
                let op_snapshot = snapshot.clone();
                let (key, tx) = blocking(move || ops::duplicate_version(&op_snapshot, &source)).await?;
                self.commit(&snapshot.directory, &snapshot.name, tx).await?;
                Ok(AckPayload::version(key, "duplicated"))
            }

            Command::DeleteVersion { component, version } => {
                let snapshot = self.state.component(&component)?;
                let key = parse_key(&version)?;
                let op_snapshot = snapshot.clone();
                let op_key = key.clone();
                let tx = blocking(move || ops::delete_version(&op_snapshot, &op_key)).await?;
                self.commit(&snapshot.directory, &snapshot.name, tx).await?;
                Ok(AckPayload::version(key, "deleted version"))
            }

            Command::RenameVersion {
                component,
                version,
                new_version,
            } => {
                let snapshot = self.state.component(&component)?;
                let old = parse_key(&version)?;
                let op_snapshot = snapshot.clone();
                let op_old = old.clone();
                let (new_key, tx) =
                    blocking(move || ops::rename_version(&op_snapshot, &op_old, &new_version)).await?;
                self.commit(&snapshot.directory, &snapshot.name, tx).await?;
                Ok(AckPayload {
                    version: Some(old.to_string()),
                    new_version: Some(new_key.to_string()),
                    message: "renamed version".to_string(),
                    component: None,
                })
            }

            Command::PromoteVersion { component, version } => {
                let snapshot = self.state.component(&component)?;
                let key = parse_key(&version)?;
                let op_snapshot = snapshot.clone();
                let op_key = key.clone();
                let tx = blocking(move || ops::promote_version(&op_snapshot, &op_key)).await?;
                self.commit(&snapshot.directory, &snapshot.name, tx).await?;
                Ok(AckPayload {
                    version: Some(key.to_string()),
                    component: Some(snapshot.name.clone()),
                    message: "promoted version".to_string(),
                    new_version: None,
                })
            }

            Command::InitComponent { path } => {
                let resolved = self.state.resolve_path(&path)?;
                let stem = resolved.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                if let Ok(tracked) = self.state.component(stem) {
                    return Err(EngineError::ComponentAlreadyVersioned {
                        component: tracked.name,
                    });
                }
                let extensions = self.state.config().watcher.extensions.clone();
                let outcome = blocking(move || ops::init_component(&resolved, &extensions)).await?;
                let name = outcome.component.name.clone();
                let directory = outcome.component.directory.clone();
                self.commit(&directory, &name, outcome.transaction).await?;
                Ok(AckPayload {
                    component: Some(name),
                    message: "initialized component".to_string(),
                    ..Default::default()
                })
            }
        }
    }

    /// Reconcile the registry with disk; roll back the command on failure
    async fn commit(&self, directory: &Path, name: &str, tx: FsTransaction) -> Result<()> {
        match self.state.resync_component(directory, name).await {
            Ok(diff) => {
                tracing::debug!("[PROCESSOR] {} committed: {:?}", name, diff);
                tx.commit();
                Ok(())
            }
            Err(e) => {
                tracing::error!("[PROCESSOR] Rolling back {} after: {}", name, e);
                if let Err(rollback_err) = blocking(move || tx.rollback()).await {
                    tracing::error!("[PROCESSOR] Rollback incomplete for {}: {}", name, rollback_err);
                }
                Err(e)
            }
        }
    }
}
