//! Command modules for the uiver CLI
//!
//! Each command module implements a single top-level command:
//! - `init` - move a component file into the versioning scheme
//! - `watch` - watch a tree and serve the websocket hub
//! - `promote` - collapse a component back to one implementation
//!
//! All command handlers take their `Args` struct from `cli.rs` and a shared
//! [`CommandContext`], and return the text to print on success.

pub mod init;
pub mod promote;
pub mod watch;

pub use init::run_init;
pub use promote::run_promote;
pub use watch::run_watch;

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{ConfigOverrides, EngineConfig};
use crate::error::{EngineError, Result};

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub overrides: ConfigOverrides,
    /// Explicit `--config` file
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            overrides: cli.overrides(),
            config_path: cli.config.clone(),
        }
    }

    /// Configuration for a watched root: file, then CLI overrides
    pub fn load_config(&self, root: &Path) -> Result<EngineConfig> {
        EngineConfig::load(root, self.config_path.as_ref())?.with_overrides(&self.overrides)
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| EngineError::Config {
        message: format!("Failed to create tokio runtime: {}", e),
    })
}
