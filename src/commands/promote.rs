//! Promote command handler
//!
//! Destructive: the chosen version becomes the entry file and every version
//! file plus the generated index is removed.

use std::path::{Path, PathBuf};

use crate::cli::PromoteArgs;
use crate::error::{EngineError, Result};
use crate::fs_utils::canonical;
use crate::processor::{Command, CommandProcessor};
use crate::scanner::parse_version_filename;
use crate::server::EngineState;

use super::{runtime, CommandContext};

pub fn run_promote(args: &PromoteArgs, ctx: &CommandContext) -> Result<String> {
    let component = component_name(&args.path).ok_or_else(|| EngineError::ComponentNotFound {
        component: args.path.display().to_string(),
    })?;
    let parent = match args.path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let directory = canonical(&parent).map_err(|e| EngineError::fs(&parent, e))?;

    let config = ctx.load_config(&directory)?;
    let runtime = runtime()?;
    let (ack, entry) = runtime.block_on(async {
        let state = EngineState::open(&directory, config).await?;
        let tracked = state.component(&component)?;
        if tracked.directory != directory {
            return Err(EngineError::ComponentNotFound {
                component: component.clone(),
            });
        }
        let ack = CommandProcessor::new(state)
            .execute(Command::PromoteVersion {
                component: component.clone(),
                version: args.version_id.clone(),
            })
            .await?;
        Ok((ack, tracked.entry_path()))
    })?;

    Ok(format!(
        "Promoted {} {} to {}\n",
        component,
        ack.version.unwrap_or_default(),
        entry.display()
    ))
}

/// `Foo` from either the entry file (`Foo.tsx`) or a version file (`Foo.v2.tsx`)
fn component_name(path: &Path) -> Option<String> {
    parse_version_filename(path)
        .map(|p| p.component)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
}
