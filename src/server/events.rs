//! Broadcast payload builders
//!
//! # Event Types
//!
//! - `components` - full listing of every tracked component, sent after any
//!   change to a version set
//! - `file_changed` - informational, one per settled watcher batch

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::registry::Registry;
use crate::socket_server::protocol::{ComponentsPayload, FileChangedPayload, ServerMessage};

/// Path relative to the watched root, with forward slashes
pub fn display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() {
        ".".to_string()
    } else {
        s
    }
}

/// `components` snapshot of the whole registry
pub fn components(root: &Path, registry: &Registry) -> ServerMessage {
    ServerMessage::Components(ComponentsPayload {
        components: registry.summaries(root),
    })
}

/// `file_changed` notice for one settled directory batch
pub fn file_changed(
    root: &Path,
    directory: &Path,
    components: &BTreeSet<String>,
    paths: &[PathBuf],
) -> ServerMessage {
    ServerMessage::FileChanged(FileChangedPayload {
        directory: display_path(root, directory),
        components: components.iter().cloned().collect(),
        paths: paths.iter().map(|p| display_path(root, p)).collect(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
