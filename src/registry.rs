//! In-memory model of the versioned components under one watched root
//!
//! The [`Registry`] is the engine's source of truth that disk state is
//! reconciled against. It is only ever rebuilt from scans; the generator and
//! hub read it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::version::VersionKey;

/// One version of a component, backed by one file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFile {
    pub key: VersionKey,
    pub absolute_path: PathBuf,
    pub label: String,
}

impl VersionFile {
    pub fn new(key: VersionKey, absolute_path: PathBuf) -> Self {
        let label = key.label();
        Self {
            key,
            absolute_path,
            label,
        }
    }

    /// File stem used in generated imports (`Foo.v1_2.tsx` -> `Foo.v1_2`)
    pub fn import_stem(&self) -> String {
        self.absolute_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A versioned component and its version files
///
/// Invariant: `versions` is never empty while the component is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub directory: PathBuf,
    /// Extension including the leading dot (`.tsx`)
    pub extension: String,
    pub versions: BTreeMap<VersionKey, VersionFile>,
    pub generated_index_path: PathBuf,
}

impl Component {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let name = name.into();
        let directory = directory.into();
        let extension = extension.into();
        let generated_index_path = index_path_for(&directory, &name, &extension);
        Self {
            name,
            directory,
            extension,
            versions: BTreeMap::new(),
            generated_index_path,
        }
    }

    /// Canonical entry file (`<dir>/<name><ext>`), the wrapper after init
    pub fn entry_path(&self) -> PathBuf {
        self.directory.join(format!("{}{}", self.name, self.extension))
    }

    /// Path a version file with this key would live at
    pub fn version_path(&self, key: &VersionKey) -> PathBuf {
        version_path_for(&self.directory, &self.name, key, &self.extension)
    }

    pub fn contains(&self, key: &VersionKey) -> bool {
        self.versions.contains_key(key)
    }

    pub fn get(&self, key: &VersionKey) -> Option<&VersionFile> {
        self.versions.get(key)
    }

    /// Highest key by numeric order
    pub fn newest(&self) -> Option<&VersionFile> {
        self.versions.values().next_back()
    }

    pub fn keys(&self) -> Vec<VersionKey> {
        self.versions.keys().cloned().collect()
    }

    pub fn insert(&mut self, file: VersionFile) {
        self.versions.insert(file.key.clone(), file);
    }

    /// Snapshot entry used in `components` broadcasts
    pub fn summary(&self, root: &Path) -> ComponentSummary {
        let entry = self.entry_path();
        let rel = entry.strip_prefix(root).unwrap_or(&entry);
        ComponentSummary {
            name: self.name.clone(),
            path: rel.to_string_lossy().replace('\\', "/"),
            versions: self.versions.keys().map(|k| k.to_string()).collect(),
        }
    }
}

/// Path of the generated index for a component
pub fn index_path_for(directory: &Path, name: &str, extension: &str) -> PathBuf {
    directory.join(format!("{}.versions{}", name, extension))
}

/// Path of a version file for a component
pub fn version_path_for(directory: &Path, name: &str, key: &VersionKey, extension: &str) -> PathBuf {
    directory.join(format!("{}.{}{}", name, key, extension))
}

/// Wire shape of one component in a `components` broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    pub path: String,
    pub versions: Vec<String>,
}

/// Mapping from component name to component, scoped to one watched root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    components: BTreeMap<String, Component>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    /// Insert or replace a component; empty components are dropped instead
    pub fn upsert(&mut self, component: Component) {
        if component.versions.is_empty() {
            self.components.remove(&component.name);
        } else {
            self.components.insert(component.name.clone(), component);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Component> {
        self.components.remove(name)
    }

    /// Replace the entry for `name` with a freshly scanned one (or drop it)
    ///
    /// Returns the diff between the previous and new version sets.
    pub fn reconcile(&mut self, name: &str, scanned: Option<Component>) -> RegistryDiff {
        let diff = diff_component(self.components.get(name), scanned.as_ref());
        match scanned {
            Some(component) => self.upsert(component),
            None => {
                self.components.remove(name);
            }
        }
        diff
    }

    /// Listing of every tracked component, in name order
    pub fn summaries(&self, root: &Path) -> Vec<ComponentSummary> {
        self.components.values().map(|c| c.summary(root)).collect()
    }
}

/// Difference between two scans of one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    pub added: Vec<VersionKey>,
    pub removed: Vec<VersionKey>,
    /// (old, new) pairs inferred from a single removal plus a single addition
    pub renamed: Vec<(VersionKey, VersionKey)>,
    /// A version kept its key but now lives at a different path
    pub moved: Vec<VersionKey>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.renamed.is_empty() && self.moved.is_empty()
    }
}

/// Compare the version sets of two snapshots of the same component
pub fn diff_component(old: Option<&Component>, new: Option<&Component>) -> RegistryDiff {
    let empty = BTreeMap::new();
    let old_versions = old.map(|c| &c.versions).unwrap_or(&empty);
    let new_versions = new.map(|c| &c.versions).unwrap_or(&empty);

    let mut added: Vec<VersionKey> = new_versions
        .keys()
        .filter(|k| !old_versions.contains_key(*k))
        .cloned()
        .collect();
    let mut removed: Vec<VersionKey> = old_versions
        .keys()
        .filter(|k| !new_versions.contains_key(*k))
        .cloned()
        .collect();
    let moved: Vec<VersionKey> = new_versions
        .iter()
        .filter(|(k, f)| {
            old_versions
                .get(*k)
                .map(|o| o.absolute_path != f.absolute_path)
                .unwrap_or(false)
        })
        .map(|(k, _)| k.clone())
        .collect();

    let mut renamed = Vec::new();
    if added.len() == 1 && removed.len() == 1 {
        renamed.push((removed.remove(0), added.remove(0)));
    }

    RegistryDiff {
        added,
        removed,
        renamed,
        moved,
    }
}
