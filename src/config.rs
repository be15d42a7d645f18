//! Engine configuration
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. An optional `uiver.toml` at the watched root (or `--config <file>`)
//! 3. CLI flags / `UIVER_*` environment variables
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 7420
//!
//! [watcher]
//! debounce_ms = 150
//! coalesce_ms = 50
//! extensions = [".tsx", ".jsx"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// File name looked up at the watched root
pub const CONFIG_FILE_NAME: &str = "uiver.toml";

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

/// WebSocket hub settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Fixed port the browser switcher connects to (0 = pick any, tests only)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7420
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// File watcher settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period per directory before a rescan runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Per-path window used to collapse raw notify bursts
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,

    /// Version file extensions, with leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_coalesce_ms() -> u64 {
    50
}

fn default_extensions() -> Vec<String> {
    [".tsx", ".jsx", ".ts", ".js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            coalesce_ms: default_coalesce_ms(),
            extensions: default_extensions(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn coalesce(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }
}

/// Values given on the command line; `None` keeps the file/default value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debounce_ms: Option<u64>,
}

impl EngineConfig {
    /// Load configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| EngineError::fs(path, e))?;

        let config: Self = toml::from_str(&content).map_err(|e| EngineError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `uiver.toml` from the watched root, or an explicit file
    pub fn load(root: &Path, explicit: Option<&PathBuf>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => Err(EngineError::Config {
                message: format!("Config file not found: {}", path.display()),
            }),
            Some(path) => Self::load_from(path),
            None => Self::load_from(&root.join(CONFIG_FILE_NAME)),
        }
    }

    /// Apply CLI overrides and re-validate
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(ms) = overrides.debounce_ms {
            self.watcher.debounce_ms = ms;
            self.watcher.coalesce_ms = self.watcher.coalesce_ms.min(ms);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(10..=5000).contains(&self.watcher.debounce_ms) {
            return Err(EngineError::Config {
                message: format!(
                    "debounce_ms must be between 10 and 5000, got {}",
                    self.watcher.debounce_ms
                ),
            });
        }
        if self.watcher.coalesce_ms > self.watcher.debounce_ms {
            return Err(EngineError::Config {
                message: "coalesce_ms must not exceed debounce_ms".to_string(),
            });
        }
        if self.watcher.extensions.is_empty() {
            return Err(EngineError::Config {
                message: "at least one version file extension is required".to_string(),
            });
        }
        if let Some(bad) = self.watcher.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(EngineError::Config {
                message: format!("extension '{}' must start with '.'", bad),
            });
        }
        Ok(())
    }

    /// `host:port` the hub binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
