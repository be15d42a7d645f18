//! Init command handler

use std::sync::Arc;

use crate::cli::InitArgs;
use crate::error::{EngineError, Result};
use crate::fs_utils::canonical;
use crate::processor::{Command, CommandProcessor};
use crate::server::EngineState;

use super::{runtime, watch, CommandContext};

/// Scaffold a component, then keep watching its directory unless `--W`
pub fn run_init(args: &InitArgs, ctx: &CommandContext) -> Result<String> {
    let path = canonical(&args.path).map_err(|_| EngineError::ComponentNotFound {
        component: args.path.display().to_string(),
    })?;
    let directory = path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| EngineError::fs(&path, "file has no parent directory"))?;
    let config = ctx.load_config(&directory)?;

    let runtime = runtime()?;
    runtime.block_on(async {
        let state = EngineState::open(&directory, config).await?;
        let processor = CommandProcessor::new(Arc::clone(&state));
        let ack = processor
            .execute(Command::InitComponent {
                path: path.to_string_lossy().into_owned(),
            })
            .await?;

        let name = ack.component.unwrap_or_default();
        let summary = format!(
            "Initialized {} in {}\n  version:  {}.v1{}\n  wrapper:  {}\n",
            name,
            directory.display(),
            name,
            extension_of(&path),
            path.display()
        );

        if args.no_watch {
            return Ok(summary);
        }
        // While serving, the summary goes to the log
        for line in summary.lines() {
            tracing::info!("{}", line);
        }
        watch::serve(state).await?;
        Ok::<_, EngineError>(String::new())
    })
}

fn extension_of(path: &std::path::Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
