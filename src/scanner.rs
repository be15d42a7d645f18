//! Directory scanner: discovers version files and builds registry entries
//!
//! Version files are named `<Component>.v<rawKey><ext>`. Scanning is
//! read-only and idempotent; files that cannot be tracked are reported in
//! [`ScanReport::skipped`] instead of failing the scan.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, Result};
use crate::registry::{Component, Registry, VersionFile};
use crate::version::normalize;

/// Component names become identifiers in generated code
static COMPONENT_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid component name regex"));

static VERSION_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_$][A-Za-z0-9_$]*)\.([vV][0-9][^.]*)(\.[A-Za-z0-9]+)$")
        .expect("valid version file regex")
});

/// Directory names never descended into by [`scan_tree`]
const IGNORED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "__pycache__", "venv"];

/// A filename split into its version-file parts (key not yet normalized)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFileName {
    pub component: String,
    pub raw_key: String,
    pub extension: String,
}

/// Whether `name` can be emitted as a JavaScript identifier
pub fn is_component_name(name: &str) -> bool {
    COMPONENT_NAME_PATTERN.is_match(name)
}

/// Split `Foo.v1_2.tsx` into (`Foo`, `v1_2`, `.tsx`)
///
/// Works on paths that no longer exist, so the watcher can use it for deletions.
pub fn parse_version_filename(path: &Path) -> Option<VersionFileName> {
    let name = path.file_name()?.to_str()?;
    let caps = VERSION_FILE_PATTERN.captures(name)?;
    Some(VersionFileName {
        component: caps.get(1)?.as_str().to_string(),
        raw_key: caps.get(2)?.as_str().to_string(),
        extension: caps.get(3)?.as_str().to_string(),
    })
}

/// Why a file was not tracked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The key part failed normalization
    InvalidKey(String),
    /// Another file already claimed the same normalized key
    DuplicateKey { kept: PathBuf },
    /// The component already uses a different extension
    ExtensionMismatch { expected: String },
    /// The component name is already tracked in another directory
    DuplicateComponent { kept: PathBuf },
}

/// A file that looked like a version file but was not tracked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of a scan: the registry plus everything that was skipped
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub registry: Registry,
    pub skipped: Vec<SkippedFile>,
}

impl ScanReport {
    fn log_skipped(&self) {
        for skipped in &self.skipped {
            tracing::warn!("Skipping {}: {:?}", skipped.path.display(), skipped.reason);
        }
    }
}

/// Scan one directory (non-recursive)
pub fn scan_directory(directory: &Path, extensions: &[String]) -> Result<ScanReport> {
    let report = scan_directory_quiet(directory, extensions)?;
    report.log_skipped();
    Ok(report)
}

fn scan_directory_quiet(directory: &Path, extensions: &[String]) -> Result<ScanReport> {
    let entries = fs::read_dir(directory).map_err(|e| EngineError::fs(directory, e))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::fs(directory, e))?;
        let file_type = entry.file_type().map_err(|e| EngineError::fs(entry.path(), e))?;
        if file_type.is_file() {
            paths.push(entry.path());
        }
    }
    // Lexicographic order decides which file wins a collision
    paths.sort();

    let mut components: BTreeMap<String, Component> = BTreeMap::new();
    let mut skipped = Vec::new();

    for path in paths {
        let Some(parsed) = parse_version_filename(&path) else {
            continue;
        };
        if !extensions.iter().any(|e| e == &parsed.extension) {
            continue;
        }
        let Some(key) = normalize(&parsed.raw_key) else {
            skipped.push(SkippedFile {
                path,
                reason: SkipReason::InvalidKey(parsed.raw_key),
            });
            continue;
        };

        let component = components
            .entry(parsed.component.clone())
            .or_insert_with(|| Component::new(&parsed.component, directory, &parsed.extension));

        if component.extension != parsed.extension {
            skipped.push(SkippedFile {
                path,
                reason: SkipReason::ExtensionMismatch {
                    expected: component.extension.clone(),
                },
            });
            continue;
        }
        if let Some(existing) = component.get(&key) {
            skipped.push(SkippedFile {
                path,
                reason: SkipReason::DuplicateKey {
                    kept: existing.absolute_path.clone(),
                },
            });
            continue;
        }
        component.insert(VersionFile::new(key, path));
    }

    let mut registry = Registry::new();
    for (_, component) in components {
        registry.upsert(component);
    }
    Ok(ScanReport { registry, skipped })
}

/// Scan a single component inside `directory`
pub fn scan_component(directory: &Path, name: &str, extensions: &[String]) -> Result<Option<Component>> {
    let report = scan_directory_quiet(directory, extensions)?;
    for skipped in report.skipped.iter().filter(|s| {
        parse_version_filename(&s.path)
            .map(|p| p.component == name)
            .unwrap_or(false)
    }) {
        tracing::warn!("Skipping {}: {:?}", skipped.path.display(), skipped.reason);
    }
    Ok(report.registry.get(name).cloned())
}

/// Whether a directory should be descended into by the tree walk and watcher
pub fn should_visit_dir(path: &Path) -> bool {
    match path.file_name().map(|n| n.to_string_lossy()) {
        Some(name) => !name.starts_with('.') && !IGNORED_DIRS.contains(&name.as_ref()),
        None => true,
    }
}

/// Scan a watched root recursively and merge every directory into one registry
pub fn scan_tree(root: &Path, extensions: &[String]) -> Result<ScanReport> {
    let mut directories = Vec::new();
    collect_directories(root, &mut directories)?;
    directories.sort();

    let mut merged = ScanReport::default();
    for dir in directories {
        let report = scan_directory_quiet(&dir, extensions)?;
        merged.skipped.extend(report.skipped);
        for component in report.registry.components() {
            if let Some(existing) = merged.registry.get(&component.name) {
                let kept = existing.directory.clone();
                merged
                    .skipped
                    .extend(component.versions.values().map(|v| SkippedFile {
                        path: v.absolute_path.clone(),
                        reason: SkipReason::DuplicateComponent { kept: kept.clone() },
                    }));
                continue;
            }
            merged.registry.upsert(component.clone());
        }
    }

    merged.log_skipped();
    tracing::debug!(
        "Scanned {}: {} components, {} skipped files",
        root.display(),
        merged.registry.len(),
        merged.skipped.len()
    );
    Ok(merged)
}

fn collect_directories(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    out.push(dir.to_path_buf());
    let entries = fs::read_dir(dir).map_err(|e| EngineError::fs(dir, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && should_visit_dir(&path) {
            collect_directories(&path, out)?;
        }
    }
    Ok(())
}
