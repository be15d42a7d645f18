//! Filesystem helpers shared by the scanner, generator and command processor
//!
//! - `normalize_path`: Strips the Windows `\\?\` prefix from canonicalized paths
//! - `atomic_rename`: Rename that replaces the target on every platform
//! - `atomic_write`: Write to a dot-prefixed temp sibling, then atomically replace
//! - `write_new`: Create a file, failing if it already exists

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of temp files created by [`atomic_write`]
pub const TEMP_SUFFIX: &str = ".uiver-tmp";

/// Normalize Windows paths by removing the `\\?\` prefix if present.
///
/// No-op on Unix.
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// Canonicalize a path and strip platform prefixes
pub fn canonical(path: &Path) -> io::Result<PathBuf> {
    Ok(normalize_path(&path.canonicalize()?))
}

/// Cross-platform atomic rename that handles Windows file replacement.
///
/// On Unix, `fs::rename` atomically replaces the target if it exists.
/// On Windows, `fs::rename` fails if the target exists, so the target is
/// deleted first.
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            fs::remove_file(dst)?;
        }
    }
    fs::rename(src, dst)
}

/// Temp sibling used while writing `path` (`dir/.name.uiver-tmp`)
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, TEMP_SUFFIX))
}

/// Write `contents` to `path` so no reader ever sees a partial file.
///
/// On failure the previous file at `path` (if any) is left untouched and the
/// temp file is cleaned up.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = temp_path_for(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        atomic_rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Create a new file with `contents`, failing with `AlreadyExists` if present
pub fn write_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Whether `path` is one of our own temp files
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}
