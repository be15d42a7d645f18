//! Error types and exit codes for uiver

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for engine operations
///
/// Every variant is recoverable at the protocol level: the hub reports it to
/// the requesting client as an `error` message and keeps serving.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid version format: '{input}' (expected v<major> or v<major>_<minor>)")]
    InvalidVersionFormat { input: String },

    #[error("Version {version} not found for component {component}")]
    VersionNotFound { component: String, version: String },

    #[error("Version {version} already exists for component {component}")]
    VersionAlreadyExists { component: String, version: String },

    #[error("Component not found: {component}")]
    ComponentNotFound { component: String },

    #[error("Component {component} is already versioned")]
    ComponentAlreadyVersioned { component: String },

    #[error("Cannot delete {version}: it is the last remaining version of {component}")]
    LastVersionDeleteRejected { component: String, version: String },

    #[error("File system operation failed on {}: {message}", path.display())]
    FileSystemFailure { path: PathBuf, message: String },

    #[error("Failed to regenerate index for {component}: {message}")]
    RegenerationFailure { component: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::FileSystemFailure {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Stable machine-readable code sent as `payload.code` in protocol errors
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersionFormat { .. } => "invalid_version_format",
            Self::VersionNotFound { .. } => "version_not_found",
            Self::VersionAlreadyExists { .. } => "version_already_exists",
            Self::ComponentNotFound { .. } => "component_not_found",
            Self::ComponentAlreadyVersioned { .. } => "component_already_versioned",
            Self::LastVersionDeleteRejected { .. } => "last_version_delete_rejected",
            Self::FileSystemFailure { .. } | Self::Io(_) => "file_system_failure",
            Self::RegenerationFailure { .. } => "regeneration_failure",
            Self::Config { .. } => "config_error",
        }
    }

    /// Process exit code for the CLI: every failure exits with 1
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(1)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
