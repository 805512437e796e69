#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tasktree::model::{Task, TaskId};
use tempfile::TempDir;

/// Scratch data directory for one test.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join(".tasktree.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join(".tasktree").join("tasks.json")
    }

    pub fn read_store(&self) -> Value {
        let content = fs::read_to_string(self.store_path()).expect("read store");
        serde_json::from_str(&content).expect("parse store")
    }

    /// `tasktree --dir <tempdir>`
    pub fn cmd(&self) -> Command {
        let mut cmd = tasktree_cmd();
        cmd.arg("--dir").arg(self.path());
        cmd
    }

    /// Run with `--json` and return the envelope's `data`.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run tasktree");
        assert!(
            output.status.success(),
            "tasktree {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }
}

pub fn tasktree_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tasktree").expect("binary");
    cmd.env_remove("TASKTREE_DIR").env_remove("RUST_LOG");
    cmd
}

/// A task as the store would hold it.
pub fn stored(id: u64, parent: Option<u64>, title: &str) -> Task {
    let mut task = Task::new(title);
    task.id = Some(TaskId::new(id));
    task.parent_id = parent.map(TaskId::new);
    task
}

pub fn ids(tasks: &[Task]) -> Vec<u64> {
    tasks
        .iter()
        .filter_map(|task| task.id.map(TaskId::get))
        .collect()
}
