//! uiver: keep several live versions of a UI component side by side
//!
//! A component `Foo` in `src/Foo.tsx` becomes a set of version files
//! (`Foo.v1.tsx`, `Foo.v1_1.tsx`, `Foo.v2.tsx`, ...), a generated index
//! (`Foo.versions.tsx`) and a wrapper that renders whichever version the
//! browser switcher selects. This crate is the engine behind that:
//!
//! - [`version`] parses and orders version keys
//! - [`scanner`] discovers version files and builds the [`Registry`]
//! - [`codegen`] renders and atomically writes the index
//! - [`server::FileWatcher`] rescans directories after bursts of edits settle
//! - [`processor::CommandProcessor`] applies new / duplicate / delete /
//!   rename / promote / init, serialized per component
//! - [`socket_server::Hub`] speaks the websocket protocol to browser clients
//!
//! # Example
//!
//! ```no_run
//! use uiver::{EngineConfig, EngineState, FileWatcher};
//!
//! # async fn demo() -> uiver::Result<()> {
//! let state = EngineState::open(std::path::Path::new("src"), EngineConfig::default()).await?;
//! let _watcher = FileWatcher::new(state.clone()).start()?;
//! uiver::socket_server::Hub::bind(state).await?.run().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codegen;
pub mod commands;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod processor;
pub mod registry;
pub mod scanner;
pub mod server;
pub mod socket_server;
pub mod version;

pub use cli::{Cli, Commands};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use processor::{Command, CommandProcessor};
pub use registry::{Component, ComponentSummary, Registry, RegistryDiff, VersionFile};
pub use scanner::{scan_directory, scan_tree, ScanReport};
pub use server::{EngineState, FileWatcher, WatcherHandle};
pub use version::{compare, normalize, VersionKey};
