//! TestRepo builder for integration testing
//!
//! Creates a temporary watched root populated with component version files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use tempfile::TempDir;

use uiver::{EngineConfig, EngineState};

/// Builder for creating watched roots
pub struct TestRepo {
    dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    /// Create a new empty watched root
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // Canonical, so paths compare equal to what the engine reports
        let root = dir.path().canonicalize().expect("Failed to canonicalize temp dir");
        Self { dir, root }
    }

    /// Canonical path of the root
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Add a file with the given content
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    /// Add `<dir>/<name>.<key>.tsx` for every key, each rendering its own key
    pub fn add_component(&self, dir: &str, name: &str, keys: &[&str]) -> &Self {
        for key in keys {
            let rel = if dir.is_empty() {
                format!("{}.{}.tsx", name, key)
            } else {
                format!("{}/{}.{}.tsx", dir, name, key)
            };
            self.add_file(&rel, &version_source(name, key));
        }
        self
    }

    pub fn read(&self, relative_path: &str) -> String {
        fs::read_to_string(self.join(relative_path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative_path, e))
    }

    pub fn exists(&self, relative_path: &str) -> bool {
        self.join(relative_path).exists()
    }

    /// Config with an ephemeral hub port and a short debounce window
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.server.port = 0;
        config.watcher.debounce_ms = 150;
        config.watcher.coalesce_ms = 30;
        config
    }

    /// Scan the root and return the live engine state
    pub async fn open(&self) -> Arc<EngineState> {
        EngineState::open(self.path(), self.config())
            .await
            .expect("Failed to open engine state")
    }

    /// Run the uiver binary in this root
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_uiver"))
            .current_dir(self.path())
            .env_remove("UIVER_PORT")
            .env_remove("UIVER_HOST")
            .args(args)
            .output()
            .expect("Failed to run CLI")
    }

    /// Run CLI and expect success, return stdout
    pub fn run_cli_success(&self, args: &[&str]) -> String {
        let output = self.run_cli(args);
        assert!(
            output.status.success(),
            "CLI command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run CLI and expect exit code 1, return stderr
    pub fn run_cli_failure(&self, args: &[&str]) -> String {
        let output = self.run_cli(args);
        assert_eq!(
            output.status.code(),
            Some(1),
            "CLI command {:?} should have exited with 1",
            args
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Source written for each test version file
pub fn version_source(name: &str, key: &str) -> String {
    format!(
        "export default function {}() {{\n  return <div>{}</div>;\n}}\n",
        name, key
    )
}
