//! Configuration loading and management
//!
//! Handles parsing of `.tasktree.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorSettings;
use crate::error::{Error, Result};

/// Config file name looked up in the data directory
pub const CONFIG_FILE: &str = ".tasktree.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    /// Persistence configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Task status vocabulary
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Event output configuration
    #[serde(default)]
    pub events: EventsConfig,
}

/// Which store backs the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Json,
    Memory,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Task document path, relative to the data directory
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long to wait for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Json
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".tasktree").join("tasks.json")
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Status given to newly created tasks
    #[serde(default = "default_task_status")]
    pub default_status: String,

    /// Status the CLI offers for work in flight
    #[serde(default = "default_task_in_progress_status")]
    pub in_progress_status: String,

    /// Status written when a task is completed
    #[serde(default = "default_task_completed_status")]
    pub completed_status: String,
}

fn default_task_status() -> String {
    crate::model::STATUS_PENDING.to_string()
}

fn default_task_in_progress_status() -> String {
    crate::model::STATUS_IN_PROGRESS.to_string()
}

fn default_task_completed_status() -> String {
    crate::model::STATUS_COMPLETED.to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_status: default_task_status(),
            in_progress_status: default_task_in_progress_status(),
            completed_status: default_task_completed_status(),
        }
    }
}

/// Event output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// JSONL event stream: `-` for stdout, anything else is a file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Durable audit log, relative to the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.tasktree.toml` from `dir`, using defaults when it is absent
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Store path resolved against the data directory
    pub fn store_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.store.path)
    }

    pub fn audit_log_path(&self, dir: &Path) -> Option<PathBuf> {
        self.events.audit_log.as_ref().map(|path| dir.join(path))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            completed_status: self.tasks.completed_status.trim().to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "log_filter cannot be empty".to_string(),
                ));
            }
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("store.path cannot be empty".to_string()));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        self.tasks.validate()?;
        if let Some(destination) = &self.events.destination {
            if destination.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "events.destination cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tasks.default_status", &self.default_status),
            ("tasks.in_progress_status", &self.in_progress_status),
            ("tasks.completed_status", &self.completed_status),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
            }
        }

        if self.default_status.trim() == self.completed_status.trim() {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_status '{}' must differ from tasks.completed_status",
                self.default_status
            )));
        }

        Ok(())
    }
}
