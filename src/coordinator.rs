//! Task coordinator: store writes, mirror upkeep, undo history, scheduling.
//!
//! Every mutation follows the same sequence under one coarse lock:
//! write the store, bring the hierarchy mirror in line, push the undo action,
//! announce the change. Holding the lock across the whole sequence keeps the
//! undo history in the same order as the store writes. A failure between the
//! store write and the mirror update leaves them apart until the next
//! [`TaskCoordinator::rebuild`].
//!
//! Absent tasks are reported as `Ok(None)`; `Err` is reserved for store
//! failures and rejected input.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hierarchy::{HierarchyEntry, HierarchyTree, InsertOutcome, RebuildReport, RelocateOutcome};
use crate::model::{Task, TaskId, STATUS_COMPLETED};
use crate::notify::{EventKind, Notifier, TaskEvent};
use crate::schedule::ScheduledQueue;
use crate::store::{SortOrder, TaskFilter, TaskStore};
use crate::undo::{UndoAction, UndoKind, UndoOutcome, UndoStack};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Status written by [`TaskCoordinator::complete`].
    pub completed_status: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            completed_status: STATUS_COMPLETED.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Mirror {
    tree: HierarchyTree,
    undo: UndoStack,
    schedule: ScheduledQueue,
}

pub struct TaskCoordinator<S, N> {
    store: S,
    notifier: N,
    settings: CoordinatorSettings,
    mirror: Mutex<Mirror>,
}

impl<S: TaskStore, N: Notifier> TaskCoordinator<S, N> {
    /// Build a coordinator and load the hierarchy from the store.
    pub fn new(store: S, notifier: N, settings: CoordinatorSettings) -> Result<Self> {
        let coordinator = Self {
            store,
            notifier,
            settings,
            mirror: Mutex::new(Mirror::default()),
        };
        coordinator.rebuild()?;
        Ok(coordinator)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    // Each step leaves the structures consistent, so a poisoned lock is safe to reuse.
    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.mirror
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, kind: EventKind, task_id: Option<TaskId>, message: String) {
        self.notifier.notify(&TaskEvent::new(kind, task_id, message));
    }

    /// Replace the hierarchy with one rebuilt from every stored task.
    ///
    /// Tasks whose parent never resolves (orphans, cycles) are left out and
    /// logged. Undo history and the schedule queue are untouched.
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let mut mirror = self.mirror();
        let tasks = self.store.find_all()?;
        let (tree, report) = HierarchyTree::rebuild(tasks);

        for task in &report.unresolved {
            warn!(
                id = ?task.id,
                parent = ?task.parent_id,
                "task left out of hierarchy: parent unresolved"
            );
        }
        for task in &report.skipped {
            warn!(id = ?task.id, title = %task.title, "task skipped during hierarchy rebuild");
        }
        info!(
            inserted = report.inserted,
            passes = report.passes,
            unresolved = report.unresolved.len(),
            "hierarchy rebuilt"
        );

        mirror.tree = tree;
        Ok(report)
    }

    /// Create a top-level task. Any parent on `task` is cleared.
    pub fn create(&self, mut task: Task) -> Result<Task> {
        debug!(title = %task.title, "creating task");
        let mut mirror = self.mirror();
        task.id = None;
        task.parent_id = None;

        let created = self.store.save(task)?;
        let id = persisted_id(&created)?;
        let outcome = mirror.tree.insert(created.clone(), None);
        if outcome != InsertOutcome::Inserted {
            warn!(%id, ?outcome, "created task not mirrored");
        }
        mirror.undo.push(UndoAction::Create {
            task: created.clone(),
        });

        self.emit(
            EventKind::TaskCreated,
            Some(id),
            format!("Task created: ID {id}, Title: {}", created.title),
        );
        Ok(created)
    }

    /// Create a task under `parent_id`.
    ///
    /// The parent's existence is the caller's concern; an unknown parent still
    /// persists the row but leaves it out of the hierarchy until a rebuild.
    pub fn create_subtask(&self, mut task: Task, parent_id: TaskId) -> Result<Task> {
        debug!(%parent_id, title = %task.title, "creating subtask");
        let mut mirror = self.mirror();
        task.id = None;
        task.parent_id = Some(parent_id);

        let created = self.store.save(task)?;
        let id = persisted_id(&created)?;
        match mirror.tree.insert(created.clone(), Some(parent_id)) {
            InsertOutcome::Inserted => {}
            outcome => warn!(%id, %parent_id, ?outcome, "subtask not mirrored"),
        }
        mirror.undo.push(UndoAction::CreateSubtask {
            task: created.clone(),
            parent_id,
        });

        self.emit(
            EventKind::SubtaskCreated,
            Some(id),
            format!("Subtask created: ID {id}, Parent ID: {parent_id}"),
        );
        Ok(created)
    }

    /// Overwrite task `id` with `values`.
    ///
    /// Identity is forced to `id` and the creation time is kept. A changed
    /// parent moves the node, subtree included. Parenting a task under itself
    /// or one of its descendants is rejected before anything is written.
    pub fn update(&self, id: TaskId, mut values: Task) -> Result<Option<Task>> {
        debug!(%id, "updating task");
        let mut mirror = self.mirror();
        let Some(existing) = self.store.find_by_id(id)? else {
            debug!(%id, "update skipped: task not found");
            return Ok(None);
        };

        if let Some(parent) = values.parent_id {
            if parent == id {
                return Err(Error::InvalidArgument(format!(
                    "task {id} cannot be its own parent"
                )));
            }
            if existing.parent_id != Some(parent) && mirror.tree.is_descendant(id, parent) {
                return Err(Error::InvalidArgument(format!(
                    "task {parent} is a descendant of {id}; moving would create a cycle"
                )));
            }
        }

        values.id = Some(id);
        values.created_at = existing.created_at;
        let saved = self.store.save(values)?;
        sync_mirror(&mut mirror.tree, &saved);
        mirror.undo.push(UndoAction::Update { previous: existing });

        self.emit(
            EventKind::TaskUpdated,
            Some(id),
            format!("Task updated: ID {id}, Title: {}", saved.title),
        );
        Ok(Some(saved))
    }

    /// Delete task `id` and its descendants from the store and the mirror.
    pub fn delete(&self, id: TaskId) -> Result<Option<Task>> {
        debug!(%id, "deleting task");
        let mut mirror = self.mirror();
        let Some(existing) = self.store.find_by_id(id)? else {
            debug!(%id, "delete skipped: task not found");
            return Ok(None);
        };

        let parent_id = existing.parent_id;
        let removed_rows = self.store.delete_by_id(id)?;
        let removed_nodes = prune_mirror(&mut mirror.tree, id, &removed_rows);
        debug!(
            %id,
            rows = removed_rows.len(),
            nodes = removed_nodes,
            "task deleted"
        );
        mirror.undo.push(UndoAction::Delete {
            previous: existing.clone(),
            parent_id,
        });

        self.emit(
            EventKind::TaskDeleted,
            Some(id),
            format!("Task deleted: ID {id}, Title: {}", existing.title),
        );
        Ok(Some(existing))
    }

    /// Mark task `id` completed and stamp its completion time.
    pub fn complete(&self, id: TaskId) -> Result<Option<Task>> {
        debug!(%id, "completing task");
        let mut mirror = self.mirror();
        let Some(existing) = self.store.find_by_id(id)? else {
            debug!(%id, "complete skipped: task not found");
            return Ok(None);
        };

        let mut completed = existing.clone();
        completed.status = self.settings.completed_status.clone();
        completed.completed_at = Some(Utc::now());
        let saved = self.store.save(completed)?;
        mirror.tree.refresh(saved.clone());
        mirror.undo.push(UndoAction::Complete { previous: existing });

        self.emit(
            EventKind::TaskCompleted,
            Some(id),
            format!("Task completed: ID {id}, Title: {}", saved.title),
        );
        Ok(Some(saved))
    }

    /// Reverse the most recent mutation from any caller.
    ///
    /// An empty history is a normal outcome. When the store fails mid-way the
    /// action goes back on the stack and the error is returned.
    pub fn undo(&self) -> Result<UndoOutcome> {
        let mut mirror = self.mirror();
        let Some(action) = mirror.undo.pop() else {
            debug!("undo requested with empty history");
            self.emit(
                EventKind::NothingToUndo,
                None,
                UndoOutcome::NOTHING_TO_UNDO.to_string(),
            );
            return Ok(UndoOutcome::Empty);
        };

        info!(kind = %action.kind(), task_id = ?action.task_id(), "undoing action");
        let outcome = match self.revert(&mut mirror, &action) {
            Ok(outcome) => outcome,
            Err(err) => {
                mirror.undo.push(action);
                return Err(err);
            }
        };

        match &outcome {
            UndoOutcome::Reverted {
                task_id, message, ..
            } => self.emit(EventKind::UndoApplied, Some(*task_id), message.clone()),
            UndoOutcome::Failed { kind, message } => warn!(%kind, "{message}"),
            UndoOutcome::Empty => {}
        }
        Ok(outcome)
    }

    fn revert(&self, mirror: &mut Mirror, action: &UndoAction) -> Result<UndoOutcome> {
        let kind = action.kind();
        let Some(id) = action.task_id() else {
            return Ok(UndoOutcome::Failed {
                kind,
                message: format!("cannot undo {kind}: recorded task has no id"),
            });
        };

        let message = match action {
            UndoAction::Create { .. } | UndoAction::CreateSubtask { .. } => {
                let removed_rows = self.store.delete_by_id(id)?;
                prune_mirror(&mut mirror.tree, id, &removed_rows);
                if kind == UndoKind::CreateSubtask {
                    format!("Undid creation of subtask ID {id}")
                } else {
                    format!("Undid creation of task ID {id}")
                }
            }
            UndoAction::Delete {
                previous,
                parent_id,
            } => {
                let restored = self.store.save(previous.clone())?;
                match mirror.tree.insert(restored, *parent_id) {
                    InsertOutcome::Inserted => {}
                    outcome => warn!(%id, ?outcome, "restored task not mirrored"),
                }
                format!("Restored deleted task ID {id}")
            }
            UndoAction::Update { previous } => {
                let restored = self.store.save(previous.clone())?;
                sync_mirror(&mut mirror.tree, &restored);
                format!("Reverted update of task ID {id}")
            }
            UndoAction::Complete { previous } => {
                let Some(mut current) = self.store.find_by_id(id)? else {
                    return Ok(UndoOutcome::Failed {
                        kind,
                        message: format!("cannot undo completion of task ID {id}: task no longer exists"),
                    });
                };
                current.status = previous.status.clone();
                current.completed_at = previous.completed_at;
                let restored = self.store.save(current)?;
                mirror.tree.refresh(restored);
                format!("Reverted completion of task ID {id}")
            }
        };

        Ok(UndoOutcome::Reverted {
            kind,
            task_id: id,
            message,
        })
    }

    pub fn undo_depth(&self) -> usize {
        self.mirror().undo.len()
    }

    /// Append a task snapshot to the schedule queue.
    pub fn schedule(&self, task: Task) {
        let mut mirror = self.mirror();
        let message = format!(
            "Task scheduled: ID {}, Title: {}",
            display_id(task.id),
            task.title
        );
        let id = task.id;
        mirror.schedule.enqueue(task);
        self.emit(EventKind::TaskScheduled, id, message);
    }

    /// Take the head of the schedule queue.
    pub fn process_next(&self) -> Option<Task> {
        let mut mirror = self.mirror();
        let Some(task) = mirror.schedule.dequeue() else {
            debug!("schedule queue empty");
            return None;
        };
        info!(id = ?task.id, title = %task.title, "processing scheduled task");
        self.emit(
            EventKind::TaskProcessed,
            task.id,
            format!(
                "Task processed: ID {}, Title: {}",
                display_id(task.id),
                task.title
            ),
        );
        Some(task)
    }

    pub fn peek_next(&self) -> Option<Task> {
        self.mirror().schedule.peek().cloned()
    }

    pub fn is_schedule_empty(&self) -> bool {
        self.mirror().schedule.is_empty()
    }

    /// Queue contents from head to tail.
    pub fn scheduled(&self) -> Vec<Task> {
        self.mirror().schedule.iter().cloned().collect()
    }

    pub fn get(&self, id: TaskId) -> Result<Option<Task>> {
        self.store.find_by_id(id)
    }

    pub fn list_all(&self) -> Result<Vec<Task>> {
        self.store.find_all()
    }

    pub fn list_by_status(&self, status: &str, order: Option<SortOrder>) -> Result<Vec<Task>> {
        self.list_filtered(&TaskFilter::Status(status.to_string()), order)
    }

    pub fn list_by_priority(&self, priority: &str, order: Option<SortOrder>) -> Result<Vec<Task>> {
        self.list_filtered(&TaskFilter::Priority(priority.to_string()), order)
    }

    pub fn list_by_type(&self, kind: &str, order: Option<SortOrder>) -> Result<Vec<Task>> {
        self.list_filtered(&TaskFilter::Type(kind.to_string()), order)
    }

    fn list_filtered(&self, filter: &TaskFilter, order: Option<SortOrder>) -> Result<Vec<Task>> {
        match order {
            Some(order) => self.store.find_by_sorted(filter, order),
            None => self.store.find_by(filter),
        }
    }

    /// Every mirrored task, each before its children.
    pub fn hierarchy(&self) -> Vec<Task> {
        self.mirror().tree.flatten()
    }

    /// Mirrored tasks with their depth.
    pub fn hierarchy_view(&self) -> Vec<HierarchyEntry> {
        self.mirror().tree.walk()
    }

    /// Read-only access to the mirror.
    pub fn with_tree<R>(&self, f: impl FnOnce(&HierarchyTree) -> R) -> R {
        f(&self.mirror().tree)
    }
}

fn persisted_id(task: &Task) -> Result<TaskId> {
    task.id.ok_or_else(|| {
        Error::OperationFailed(format!("store returned task '{}' without an id", task.title))
    })
}

fn display_id(id: Option<TaskId>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Drop `id` and every row the store's cascade removed, including rows whose
/// store parent was never mirrored. Returns the number of nodes removed.
fn prune_mirror(tree: &mut HierarchyTree, id: TaskId, removed_rows: &[TaskId]) -> usize {
    let mut removed = tree.remove(id).len();
    for row in removed_rows {
        removed += tree.remove(*row).len();
    }
    removed
}

/// Bring the mirror in line with a freshly saved row: refresh the value and
/// follow a parent change, or attach the row if it was not mirrored.
fn sync_mirror(tree: &mut HierarchyTree, saved: &Task) {
    let Some(id) = saved.id else {
        return;
    };

    if !tree.contains(id) {
        match tree.insert(saved.clone(), saved.parent_id) {
            InsertOutcome::Inserted => debug!(%id, "task attached to hierarchy"),
            outcome => debug!(%id, ?outcome, "task still outside hierarchy"),
        }
        return;
    }

    tree.refresh(saved.clone());
    match tree.relocate(id, saved.parent_id) {
        RelocateOutcome::Moved => debug!(%id, parent = ?saved.parent_id, "task moved"),
        RelocateOutcome::Unchanged | RelocateOutcome::NotFound => {}
        RelocateOutcome::UnresolvedParent(parent) => {
            warn!(%id, %parent, "new parent not in hierarchy; position kept until rebuild")
        }
        RelocateOutcome::WouldCycle => {
            warn!(%id, parent = ?saved.parent_id, "move would create a cycle; position kept")
        }
    }
}
