//! Test helper module for E2E tests
//!
//! Provides `TestFixture` for easy test setup with file operations and
//! running the `todos` CLI.

#![allow(dead_code)] // Test helpers may not be used in all test modules
#![allow(deprecated)] // cargo_bin() deprecation

pub mod mcp;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use std::path::PathBuf;

/// Test fixture providing a temporary directory with helper methods
/// for file operations and running the `todos` CLI.
pub struct TestFixture {
    pub dir: TempDir,
}

impl TestFixture {
    /// Create a new test environment with a fresh temp directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Get the root path of the test directory
    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    // ============ File Operations ============

    /// Add a source file with content (creates parent dirs automatically)
    pub fn add_file(&self, path: &str, content: &str) -> &Self {
        let file = self.dir.child(path);
        file.write_str(content).unwrap();
        self
    }

    /// Add a binary file with raw bytes
    pub fn add_binary(&self, path: &str, bytes: &[u8]) -> &Self {
        let file = self.dir.child(path);
        file.write_binary(bytes).unwrap();
        self
    }

    /// Delete a file from the test directory
    pub fn remove_file(&self, path: &str) -> &Self {
        std::fs::remove_file(self.root().join(path)).unwrap();
        self
    }

    /// Add a pattern to .gitignore
    pub fn git_ignore(&self, pattern: &str) -> &Self {
        let gitignore_path = self.root().join(".gitignore");
        let mut content = std::fs::read_to_string(&gitignore_path).unwrap_or_default();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(pattern);
        content.push('\n');
        std::fs::write(&gitignore_path, content).unwrap();
        self
    }

    // ============ todos CLI ============

    /// Create a Command for running `todos`; --root must come AFTER the subcommand
    pub fn todos(&self) -> Command {
        let mut cmd = Command::cargo_bin("todos").unwrap();
        cmd.current_dir(self.root());
        cmd
    }

    /// Run `todos list` with extra args and return the output
    pub fn list_with(&self, args: &[&str]) -> std::process::Output {
        self.todos()
            .arg("list")
            .arg("--root")
            .arg(self.root())
            .args(args)
            .output()
            .expect("todos list failed")
    }

    /// Run `todos list` and return stdout as a string, asserting success
    pub fn list(&self) -> String {
        let output = self.list_with(&[]);
        assert!(
            output.status.success(),
            "todos list failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Run `todos list --json` and parse the report
    pub fn list_json(&self) -> serde_json::Value {
        let output = self.list_with(&["--json"]);
        assert!(
            output.status.success(),
            "todos list --json failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("list --json should print JSON")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
