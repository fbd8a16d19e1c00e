#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use daysheet::grid::GridDocument;
use daysheet::ledger::LogEntry;
use tempfile::TempDir;

/// Throwaway data root for driving the binary.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Data root with `daysheet init` already run.
    pub fn initialized() -> Self {
        let root = Self::new();
        root.cmd().arg("init").assert().success();
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(".daysheet.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `daysheet` bound to this root, with tracing disabled.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("daysheet").expect("binary");
        cmd.env("DAYSHEET_ROOT", self.dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and parse the envelope.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run daysheet");
        serde_json::from_slice(&output.stdout).expect("json envelope")
    }

    pub fn read_grid(&self) -> GridDocument {
        let content = fs::read_to_string(self.dir.path().join("grid.json")).expect("grid.json");
        serde_json::from_str(&content).expect("grid document")
    }

    pub fn read_logs(&self) -> Vec<LogEntry> {
        let path = self.dir.path().join("ledger").join("logs.jsonl");
        let Ok(content) = fs::read_to_string(path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("log entry"))
            .collect()
    }
}
