//! WebSocket protocol message types
//!
//! Every message is a JSON envelope `{"type": ..., "payload": {...}}`.
//!
//! ```json
//! // Client -> Server
//! {"type": "duplicate_version", "payload": {"component": "Foo", "version": "v1"}}
//! {"type": "rename_version", "payload": {"component": "Foo", "version": "v2", "newVersion": "2.2"}}
//!
//! // Server -> Client
//! {"type": "ack", "payload": {"version": "v1_1", "message": "duplicated"}}
//! {"type": "error", "payload": {"message": "...", "code": "version_not_found"}}
//! {"type": "components", "payload": {"components": [{"name": "Foo", "path": "src/Foo.tsx", "versions": ["v1"]}]}}
//! ```
//!
//! There is no request id: an ack is matched to its command only by arriving
//! on the same connection.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::processor::Command;
use crate::registry::ComponentSummary;

/// Client-to-server message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    NewVersion(ComponentPayload),
    DuplicateVersion(VersionPayload),
    DeleteVersion(VersionPayload),
    RenameVersion(RenamePayload),
    PromoteVersion(VersionPayload),
    /// `component` carries the path of the file to scaffold
    InitComponent(ComponentPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentPayload {
    pub component: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionPayload {
    pub component: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenamePayload {
    pub component: String,
    pub version: String,
    pub new_version: String,
}

impl From<ClientMessage> for Command {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::NewVersion(p) => Command::NewVersion {
                component: p.component,
            },
            ClientMessage::DuplicateVersion(p) => Command::DuplicateVersion {
                component: p.component,
                version: p.version,
            },
            ClientMessage::DeleteVersion(p) => Command::DeleteVersion {
                component: p.component,
                version: p.version,
            },
            ClientMessage::RenameVersion(p) => Command::RenameVersion {
                component: p.component,
                version: p.version,
                new_version: p.new_version,
            },
            ClientMessage::PromoteVersion(p) => Command::PromoteVersion {
                component: p.component,
                version: p.version,
            },
            ClientMessage::InitComponent(p) => Command::InitComponent { path: p.component },
        }
    }
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast success reply to the requesting connection
    Ack(AckPayload),
    /// Unicast failure reply to the requesting connection
    Error(ErrorPayload),
    /// Informational notice after a settled watcher batch
    FileChanged(FileChangedPayload),
    /// Full registry listing, broadcast to every client
    Components(ComponentsPayload),
}

impl ServerMessage {
    pub fn error(err: &EngineError) -> Self {
        Self::Error(ErrorPayload {
            message: err.to_string(),
            code: err.code().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl AckPayload {
    pub fn version(version: impl ToString, message: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            message: message.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChangedPayload {
    pub directory: String,
    pub components: Vec<String>,
    pub paths: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentsPayload {
    pub components: Vec<ComponentSummary>,
}
