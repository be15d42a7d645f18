//! Filesystem side of each command
//!
//! These functions are synchronous and run on the blocking pool. They take a
//! snapshot of the target component, validate the request against it, and
//! perform their steps through an [`FsTransaction`] so the caller can roll
//! everything back if a later step (index regeneration) fails.

use std::fs;
use std::path::Path;

use crate::codegen::{render_index, render_wrapper};
use crate::error::{EngineError, Result};
use crate::registry::{index_path_for, version_path_for, Component, VersionFile};
use crate::scanner::{is_component_name, parse_version_filename, scan_component};
use crate::version::{normalize, VersionKey};

use super::transaction::FsTransaction;

fn require<'a>(component: &'a Component, key: &VersionKey) -> Result<&'a VersionFile> {
    component
        .get(key)
        .ok_or_else(|| EngineError::VersionNotFound {
            component: component.name.clone(),
            version: key.to_string(),
        })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| EngineError::fs(path, e))
}

/// Key for `new_version`: highest existing major + 1
pub fn next_major(component: &Component) -> VersionKey {
    let highest = component
        .versions
        .keys()
        .map(|k| k.major_part())
        .max()
        .unwrap_or(0);
    VersionKey::major(highest + 1)
}

/// Key for `duplicate_version`: first unused minor after the source's
pub fn next_minor(component: &Component, source: &VersionKey) -> VersionKey {
    let mut minor = source.minor_part().unwrap_or(0) + 1;
    loop {
        let candidate = VersionKey::with_minor(source.major_part(), minor);
        if !component.contains(&candidate) {
            return candidate;
        }
        minor += 1;
    }
}

/// Create `v<N+1>` as a copy of the newest version
pub fn new_version(component: &Component) -> Result<(VersionKey, FsTransaction)> {
    let newest = component
        .newest()
        .ok_or_else(|| EngineError::ComponentNotFound {
            component: component.name.clone(),
        })?;
    let contents = read(&newest.absolute_path)?;

    let key = next_major(component);
    let mut tx = FsTransaction::new();
    tx.create(&component.version_path(&key), &contents)?;
    Ok((key, tx))
}

/// Copy `source` verbatim into the next free minor under its major
pub fn duplicate_version(component: &Component, source: &VersionKey) -> Result<(VersionKey, FsTransaction)> {
    let source_file = require(component, source)?;
    let contents = read(&source_file.absolute_path)?;

    let key = next_minor(component, source);
    let mut tx = FsTransaction::new();
    tx.create(&component.version_path(&key), &contents)?;
    Ok((key, tx))
}

/// Delete one version; the last remaining version is never deleted
pub fn delete_version(component: &Component, key: &VersionKey) -> Result<FsTransaction> {
    let file = require(component, key)?;
    if component.versions.len() <= 1 {
        return Err(EngineError::LastVersionDeleteRejected {
            component: component.name.clone(),
            version: key.to_string(),
        });
    }

    let mut tx = FsTransaction::new();
    tx.remove(&file.absolute_path)?;
    Ok(tx)
}

/// Rename `old` to the normalized form of `new_raw`
pub fn rename_version(
    component: &Component,
    old: &VersionKey,
    new_raw: &str,
) -> Result<(VersionKey, FsTransaction)> {
    let file = require(component, old)?;
    let new_key = normalize(new_raw).ok_or_else(|| EngineError::InvalidVersionFormat {
        input: new_raw.to_string(),
    })?;
    if component.contains(&new_key) {
        return Err(EngineError::VersionAlreadyExists {
            component: component.name.clone(),
            version: new_key.to_string(),
        });
    }

    let mut tx = FsTransaction::new();
    tx.rename(&file.absolute_path, &component.version_path(&new_key))?;
    Ok((new_key, tx))
}

/// Make one version the canonical entry file and remove all scaffolding
pub fn promote_version(component: &Component, key: &VersionKey) -> Result<FsTransaction> {
    let chosen = require(component, key)?;
    let source = read(&chosen.absolute_path)?;

    let mut tx = FsTransaction::new();
    tx.overwrite(&component.entry_path(), &source)?;
    for file in component.versions.values() {
        tx.remove(&file.absolute_path)?;
    }
    if component.generated_index_path.exists() {
        tx.remove(&component.generated_index_path)?;
    }
    Ok(tx)
}

/// Result of scaffolding a plain component file into the version scheme
#[derive(Debug)]
pub struct InitOutcome {
    pub component: Component,
    pub transaction: FsTransaction,
}

/// Move `<dir>/<Name><ext>` to `<Name>.v1<ext>`, write the index and wrapper
pub fn init_component(path: &Path, extensions: &[String]) -> Result<InitOutcome> {
    let meta = fs::metadata(path).map_err(|_| EngineError::ComponentNotFound {
        component: path.display().to_string(),
    })?;
    if !meta.is_file() {
        return Err(EngineError::ComponentNotFound {
            component: path.display().to_string(),
        });
    }

    let (name, extension) = split_entry_name(path)?;
    if !extensions.iter().any(|e| e == &extension) {
        return Err(EngineError::fs(
            path,
            format!("unsupported extension '{}' (expected one of {:?})", extension, extensions),
        ));
    }
    if parse_version_filename(path).is_some() {
        return Err(EngineError::ComponentAlreadyVersioned { component: name });
    }
    if !is_component_name(&name) {
        return Err(EngineError::fs(
            path,
            format!("'{}' is not a valid component identifier", name),
        ));
    }

    let directory = path
        .parent()
        .ok_or_else(|| EngineError::fs(path, "file has no parent directory"))?
        .to_path_buf();
    let index_path = index_path_for(&directory, &name, &extension);
    if index_path.exists() || scan_component(&directory, &name, extensions)?.is_some() {
        return Err(EngineError::ComponentAlreadyVersioned { component: name });
    }

    let v1 = VersionKey::major(1);
    let v1_path = version_path_for(&directory, &name, &v1, &extension);
    let mut component = Component::new(&name, &directory, &extension);
    component.insert(VersionFile::new(v1, v1_path.clone()));

    let mut tx = FsTransaction::new();
    tx.rename(path, &v1_path)?;
    let staged = (|| {
        tx.overwrite(&index_path, render_index(&component).as_bytes())?;
        tx.create(path, render_wrapper(&name, &extension).as_bytes())
    })();
    if let Err(e) = staged {
        tx.rollback()?;
        return Err(e);
    }

    Ok(InitOutcome {
        component,
        transaction: tx,
    })
}

/// Split `Foo.tsx` into (`Foo`, `.tsx`)
fn split_entry_name(path: &Path) -> Result<(String, String)> {
    let stem = path.file_stem().and_then(|s| s.to_str());
    let ext = path.extension().and_then(|s| s.to_str());
    match (stem, ext) {
        (Some(stem), Some(ext)) if !stem.is_empty() => Ok((stem.to_string(), format!(".{}", ext))),
        _ => Err(EngineError::fs(path, "expected a file named <Component>.<ext>")),
    }
}
