//! Mutation announcements.
//!
//! Every coordinator mutation emits a [`TaskEvent`] carrying a human-readable
//! description. Delivery is fire-and-forget: a [`Notifier`] never reports
//! failure to its caller and logs its own problems instead.
//!
//! Sinks:
//! - [`TracingNotifier`]: structured log line per event
//! - [`JsonlNotifier`]: JSON lines to stdout or a file
//! - [`AuditLog`]: durable JSONL log of [`LogEntry`] records, readable back
//! - [`MemoryNotifier`]: keeps events in memory
//! - [`FanoutNotifier`]: forwards to several sinks

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::TaskId;

pub const EVENT_SCHEMA_VERSION: &str = "tasktree.event.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    SubtaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskCompleted,
    UndoApplied,
    NothingToUndo,
    TaskScheduled,
    TaskProcessed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task_created",
            EventKind::SubtaskCreated => "subtask_created",
            EventKind::TaskUpdated => "task_updated",
            EventKind::TaskDeleted => "task_deleted",
            EventKind::TaskCompleted => "task_completed",
            EventKind::UndoApplied => "undo_applied",
            EventKind::NothingToUndo => "nothing_to_undo",
            EventKind::TaskScheduled => "task_scheduled",
            EventKind::TaskProcessed => "task_processed",
        }
    }
}

/// One announcement: a kind, the affected task, and a description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEvent {
    pub schema_version: String,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub message: String,
}

impl TaskEvent {
    pub fn new(event: EventKind, task_id: Option<TaskId>, message: impl Into<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            event,
            timestamp: Utc::now(),
            task_id,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &TaskEvent);
}

impl Notifier for () {
    fn notify(&self, _event: &TaskEvent) {}
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, event: &TaskEvent) {
        (**self).notify(event)
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, event: &TaskEvent) {
        (**self).notify(event)
    }
}

/// Logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &TaskEvent) {
        info!(
            event = event.event.as_str(),
            task_id = ?event.task_id,
            "{}",
            event.message
        );
    }
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<TaskEvent>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.message).collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|event| event.event).collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, event: &TaskEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Forwards every event to each inner notifier in order.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Notifier>) {
        self.sinks.push(sink);
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: &TaskEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    /// `-` means stdout; blank means no destination.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// JSONL writer over stdout or an append-mode file.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    pub fn emit(&mut self, event: &TaskEvent) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes each event as a JSON line to an [`EventSink`].
pub struct JsonlNotifier {
    sink: Mutex<EventSink>,
}

impl JsonlNotifier {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    pub fn open(destination: &EventDestination) -> Result<Self> {
        Ok(Self::new(destination.open()?))
    }
}

impl Notifier for JsonlNotifier {
    fn notify(&self, event: &TaskEvent) {
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = sink.emit(event) {
            warn!(event = event.event.as_str(), "event emit failed: {err}");
        }
    }
}

/// Durable record of one announced event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: Uuid,
    pub message: String,
    pub event_type: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl LogEntry {
    pub fn from_event(event: &TaskEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: event.message.clone(),
            event_type: event.event,
            timestamp: event.timestamp,
            task_id: event.task_id,
        }
    }
}

/// Append-only JSONL audit log, shared safely between processes.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let line = serde_json::to_string(entry)?;
        lock::append_line(&self.path, &line)
    }

    /// All entries, oldest first. A missing log reads as empty.
    pub fn read_entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let content = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(trimmed)?);
        }
        Ok(entries)
    }
}

impl Notifier for AuditLog {
    fn notify(&self, event: &TaskEvent) {
        if let Err(err) = self.append(&LogEntry::from_event(event)) {
            warn!(path = %self.path.display(), "audit log append failed: {err}");
        }
    }
}
