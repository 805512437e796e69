//! Per-invocation wiring: config, store, notifiers and the coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, StoreBackend};
use crate::coordinator::TaskCoordinator;
use crate::error::Result;
use crate::model::TaskId;
use crate::notify::{AuditLog, EventDestination, FanoutNotifier, JsonlNotifier, TracingNotifier};
use crate::output::OutputOptions;
use crate::store::{JsonStore, MemoryStore, TaskStore};

pub type CliCoordinator = TaskCoordinator<Arc<dyn TaskStore>, FanoutNotifier>;

pub struct Context {
    pub config: Config,
    pub coordinator: CliCoordinator,
    pub audit_log: Option<AuditLog>,
    events_to_stdout: bool,
}

impl Context {
    /// Load config from `dir` (or the current directory) and open the store.
    pub fn open(dir: Option<PathBuf>, events: Option<&str>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let config = Config::load_from_dir(&dir)?;
        let store = open_store(&config, &dir);

        let destination =
            EventDestination::parse(events.or(config.events.destination.as_deref()));
        let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
        let audit_log = config.audit_log_path(&dir).map(AuditLog::new);

        let mut notifier = FanoutNotifier::new().with(TracingNotifier);
        if let Some(destination) = destination.as_ref() {
            notifier.push(Box::new(JsonlNotifier::open(destination)?));
        }
        if let Some(audit_log) = audit_log.clone() {
            notifier.push(Box::new(audit_log));
        }

        let coordinator = TaskCoordinator::new(store, notifier, config.coordinator_settings())?;
        Ok(Self {
            config,
            coordinator,
            audit_log,
            events_to_stdout,
        })
    }

    /// Event lines on stdout take precedence over command output.
    pub fn output_options(&self, json: bool, quiet: bool) -> OutputOptions {
        OutputOptions {
            json: json && !self.events_to_stdout,
            quiet: quiet || self.events_to_stdout,
        }
    }

    pub fn default_status(&self) -> &str {
        self.config.tasks.default_status.trim()
    }
}

fn open_store(config: &Config, dir: &Path) -> Arc<dyn TaskStore> {
    match config.store.backend {
        StoreBackend::Json => {
            let path = config.store_path(dir);
            debug!(path = %path.display(), "opening json store");
            Arc::new(JsonStore::open(path).with_lock_timeout(config.store.lock_timeout_ms))
        }
        StoreBackend::Memory => {
            debug!("opening memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

pub fn parse_id(raw: &str) -> Result<TaskId> {
    raw.trim().parse()
}
