//! Code generation for the per-component index and wrapper files
//!
//! The index lists one import per version (ascending key order) and a
//! `versions` map from key to `{ render, label }`. Output is a pure function
//! of the component's version set, so regenerating an unchanged component is
//! byte-identical and the file is not rewritten.

use std::fmt::Write as _;
use std::fs;

use crate::error::{EngineError, Result};
use crate::fs_utils::atomic_write;
use crate::registry::Component;

/// Banner at the top of every generated index
pub const GENERATED_BANNER: &str = "// Generated by uiver. Do not edit: changes are overwritten on every rescan.";

/// Module the wrapper imports the switcher from
pub const SWITCHER_MODULE: &str = "uiver/react";

/// Render the index source for a component
pub fn render_index(component: &Component) -> String {
    let mut out = String::new();
    out.push_str(GENERATED_BANNER);
    out.push_str("\n\n");

    for file in component.versions.values() {
        let _ = writeln!(
            out,
            "import {} from \"./{}\";",
            file.key.ident(),
            file.import_stem()
        );
    }

    out.push_str("\nexport const versions = {\n");
    for file in component.versions.values() {
        let _ = writeln!(
            out,
            "  {}: {{ render: {}, label: {} }},",
            quote(&file.key.to_string()),
            file.key.ident(),
            quote(&file.label)
        );
    }
    out.push_str("} as const;\n\n");

    let _ = writeln!(
        out,
        "export type {}Version = keyof typeof versions;",
        component.name
    );
    if let Some(newest) = component.newest() {
        let _ = writeln!(
            out,
            "\nexport const latestVersion: {}Version = {};",
            component.name,
            quote(&newest.key.to_string())
        );
    }
    out
}

/// Render the wrapper that replaces the canonical entry file on init
///
/// The wrapper renders whichever version the in-browser switcher marks as
/// active; the switcher itself lives in [`SWITCHER_MODULE`].
pub fn render_wrapper(name: &str, extension: &str) -> String {
    let index_module = format!("./{}.versions", name);
    let mut out = String::new();
    out.push_str(GENERATED_BANNER);
    out.push_str("\n\n");
    let _ = writeln!(out, "import {{ VersionSwitcher }} from {};", quote(SWITCHER_MODULE));
    let _ = writeln!(out, "import {{ versions }} from {};", quote(&index_module));
    out.push('\n');

    let params = if extension.starts_with(".ts") { "props: any" } else { "props" };
    if extension.ends_with('x') {
        let _ = writeln!(out, "export default function {}({}) {{", name, params);
        let _ = writeln!(
            out,
            "  return <VersionSwitcher component={} versions={{versions}} props={{props}} />;",
            quote(name)
        );
    } else {
        out.push_str("import { createElement } from \"react\";\n\n");
        let _ = writeln!(out, "export default function {}({}) {{", name, params);
        let _ = writeln!(
            out,
            "  return createElement(VersionSwitcher, {{ component: {}, versions, props }});",
            quote(name)
        );
    }
    out.push_str("}\n\nexport { versions };\n");
    out
}

/// Write the index atomically if its content changed
///
/// Returns `true` when the file was (re)written. On failure the previous
/// index is left untouched.
pub fn write_index(component: &Component) -> Result<bool> {
    if component.versions.is_empty() {
        return Err(EngineError::RegenerationFailure {
            component: component.name.clone(),
            message: "component has no versions".to_string(),
        });
    }

    let rendered = render_index(component);
    let path = &component.generated_index_path;
    if let Ok(existing) = fs::read(path) {
        if existing == rendered.as_bytes() {
            return Ok(false);
        }
    }

    atomic_write(path, rendered.as_bytes()).map_err(|e| EngineError::RegenerationFailure {
        component: component.name.clone(),
        message: format!("{}: {}", path.display(), e),
    })?;
    tracing::debug!("Regenerated index {}", path.display());
    Ok(true)
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
