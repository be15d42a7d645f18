//! CLI argument definitions using clap with subcommand architecture

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

/// Keep several live versions of a UI component side by side
#[derive(Parser, Debug)]
#[command(name = "uiver")]
#[command(about = "Keep several live versions of a UI component and switch between them in the browser")]
#[command(version)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Show debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Port the websocket hub listens on
    #[arg(long, global = true, env = "UIVER_PORT")]
    pub port: Option<u16>,

    /// Host the websocket hub binds to
    #[arg(long, global = true, env = "UIVER_HOST")]
    pub host: Option<String>,

    /// Quiet period before a changed directory is rescanned
    #[arg(long, global = true, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Config file to use instead of `<root>/uiver.toml`
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            debounce_ms: self.debounce_ms,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move a component file into the versioning scheme (then watch it)
    Init(InitArgs),

    /// Watch a directory tree and serve the websocket hub
    Watch(WatchArgs),

    /// Make one version the component's only implementation
    Promote(PromoteArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Component source file, e.g. src/components/Card.tsx
    pub path: PathBuf,

    /// Do not start watching after initializing
    #[arg(long = "W")]
    pub no_watch: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory to watch
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct PromoteArgs {
    /// The component's entry file or any of its version files
    pub path: PathBuf,

    /// Version to promote, e.g. v2 or 2.1
    #[arg(value_name = "VERSION_ID")]
    pub version_id: String,
}
