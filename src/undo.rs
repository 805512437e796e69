//! Undo history for task mutations.
//!
//! Each mutation records an [`UndoAction`] holding the state needed to
//! reverse it: the task as it was before the change, or the created task for
//! creations. The stack is a single LIFO history; popping an empty stack is a
//! normal outcome, not an error. There is no redo.

use std::fmt;

use serde::Serialize;

use crate::model::{Task, TaskId};

/// A recorded, reversible mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// A top-level task was created; reversal deletes it.
    Create { task: Task },
    /// A subtask was created under `parent_id`; reversal deletes it.
    CreateSubtask { task: Task, parent_id: TaskId },
    /// A task was overwritten; reversal re-saves `previous`.
    Update { previous: Task },
    /// A task was deleted; reversal restores it under `parent_id`.
    Delete {
        previous: Task,
        parent_id: Option<TaskId>,
    },
    /// A task was completed; reversal restores status and completion time.
    Complete { previous: Task },
}

impl UndoAction {
    pub fn kind(&self) -> UndoKind {
        match self {
            UndoAction::Create { .. } => UndoKind::Create,
            UndoAction::CreateSubtask { .. } => UndoKind::CreateSubtask,
            UndoAction::Update { .. } => UndoKind::Update,
            UndoAction::Delete { .. } => UndoKind::Delete,
            UndoAction::Complete { .. } => UndoKind::Complete,
        }
    }

    /// The task snapshot carried by the action.
    pub fn task(&self) -> &Task {
        match self {
            UndoAction::Create { task } | UndoAction::CreateSubtask { task, .. } => task,
            UndoAction::Update { previous }
            | UndoAction::Delete { previous, .. }
            | UndoAction::Complete { previous } => previous,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task().id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoKind {
    Create,
    CreateSubtask,
    Update,
    Delete,
    Complete,
}

impl UndoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UndoKind::Create => "create",
            UndoKind::CreateSubtask => "create_subtask",
            UndoKind::Update => "update",
            UndoKind::Delete => "delete",
            UndoKind::Complete => "complete",
        }
    }
}

impl fmt::Display for UndoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an undo request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UndoOutcome {
    Reverted {
        kind: UndoKind,
        task_id: TaskId,
        message: String,
    },
    /// The action was popped but could not be reversed.
    Failed { kind: UndoKind, message: String },
    /// The history was empty.
    Empty,
}

impl UndoOutcome {
    pub const NOTHING_TO_UNDO: &'static str = "nothing to undo";

    pub fn message(&self) -> &str {
        match self {
            UndoOutcome::Reverted { message, .. } | UndoOutcome::Failed { message, .. } => message,
            UndoOutcome::Empty => Self::NOTHING_TO_UNDO,
        }
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, UndoOutcome::Reverted { .. })
    }

    pub fn kind(&self) -> Option<UndoKind> {
        match self {
            UndoOutcome::Reverted { kind, .. } | UndoOutcome::Failed { kind, .. } => Some(*kind),
            UndoOutcome::Empty => None,
        }
    }
}

/// Unbounded LIFO history of undo actions.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    actions: Vec<UndoAction>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    /// Remove and return the most recently pushed action.
    pub fn pop(&mut self) -> Option<UndoAction> {
        self.actions.pop()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(id: u64) -> Task {
        let mut task = Task::new(format!("task {id}"));
        task.id = Some(TaskId::new(id));
        task
    }

    #[test]
    fn pops_in_reverse_push_order() {
        let mut stack = UndoStack::new();
        stack.push(UndoAction::Create { task: saved(1) });
        stack.push(UndoAction::Update { previous: saved(2) });
        stack.push(UndoAction::Delete {
            previous: saved(3),
            parent_id: None,
        });
        assert_eq!(stack.len(), 3);

        assert_eq!(stack.pop().map(|a| a.kind()), Some(UndoKind::Delete));
        assert_eq!(stack.pop().map(|a| a.kind()), Some(UndoKind::Update));
        assert_eq!(stack.pop().map(|a| a.kind()), Some(UndoKind::Create));
        assert!(stack.pop().is_none());
        assert!(stack.is_empty());
    }

    #[test]
    fn action_exposes_snapshot_identity() {
        let action = UndoAction::CreateSubtask {
            task: saved(8),
            parent_id: TaskId::new(2),
        };
        assert_eq!(action.task_id(), Some(TaskId::new(8)));
        assert_eq!(action.kind().to_string(), "create_subtask");
    }

    #[test]
    fn empty_outcome_reads_nothing_to_undo() {
        assert_eq!(UndoOutcome::Empty.message(), "nothing to undo");
        assert!(UndoOutcome::Empty.kind().is_none());
        let json = serde_json::to_value(UndoOutcome::Empty).expect("serialize");
        assert_eq!(json["outcome"], "empty");
    }
}
