//! Watch command handler
//!
//! Scans the tree, starts the debounced watcher and serves the websocket hub
//! until Ctrl-C.

use std::sync::Arc;

use crate::cli::WatchArgs;
use crate::error::{EngineError, Result};
use crate::server::{EngineState, FileWatcher};
use crate::socket_server::Hub;

use super::{runtime, CommandContext};

pub fn run_watch(args: &WatchArgs, ctx: &CommandContext) -> Result<String> {
    if !args.path.is_dir() {
        return Err(EngineError::fs(&args.path, "not a directory"));
    }
    let config = ctx.load_config(&args.path)?;
    let runtime = runtime()?;
    runtime.block_on(async {
        let state = EngineState::open(&args.path, config).await?;
        serve(state).await
    })?;
    Ok(String::new())
}

/// Run the watcher and hub for an opened state until interrupted
pub async fn serve(state: Arc<EngineState>) -> Result<()> {
    tracing::info!(
        "uiver v{} watching {}",
        env!("CARGO_PKG_VERSION"),
        state.root().display()
    );

    let watcher = FileWatcher::new(Arc::clone(&state));
    let handle = watcher.start()?;
    let hub = Hub::bind(Arc::clone(&state)).await?;

    tokio::select! {
        _ = hub.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutting down");
        }
    }

    handle.stop();
    Ok(())
}
