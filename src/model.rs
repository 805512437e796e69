//! Task domain model.
//!
//! A task is plain data: identity, descriptive and classification fields,
//! timestamps and an optional parent reference. Status is an open string
//! classification; the canonical values are exported as constants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Store-assigned task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The identity following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        trimmed
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| Error::InvalidArgument(format!("invalid task id: '{trimmed}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
}

impl Task {
    /// New unpersisted task with `PENDING` status, stamped with the current time.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            status: STATUS_PENDING.to_string(),
            priority: None,
            kind: None,
            created_at: Utc::now(),
            completed_at: None,
            parent_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// A task must never name itself as parent.
    pub fn is_self_parented(&self) -> bool {
        matches!((self.id, self.parent_id), (Some(id), Some(parent)) if id == parent)
    }

    pub fn is_completed_as(&self, completed_status: &str) -> bool {
        self.status.eq_ignore_ascii_case(completed_status)
    }

    /// Short label used in notifications and CLI output.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => format!("#{id} {}", self.title),
            None => format!("(unsaved) {}", self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_and_unpersisted() {
        let task = Task::new("Write report");
        assert_eq!(task.status, STATUS_PENDING);
        assert!(task.id.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.parent_id.is_none());
    }

    #[test]
    fn self_parenting_is_detected() {
        let mut task = Task::new("loop").with_parent(TaskId::new(7));
        assert!(!task.is_self_parented());
        task.id = Some(TaskId::new(7));
        assert!(task.is_self_parented());
    }

    #[test]
    fn task_id_parses_and_rejects_garbage() {
        assert_eq!(" 42 ".parse::<TaskId>().expect("parse"), TaskId::new(42));
        let err = "abc".parse::<TaskId>().expect_err("invalid");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn serializes_kind_as_type_and_skips_empty_fields() {
        let task = Task::new("Deploy").with_kind("ops");
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["type"], "ops");
        assert!(json.get("parent_id").is_none());
        assert!(json.get("id").is_none());

        let back: Task = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, task);
    }
}
