//! Task persistence.
//!
//! [`TaskStore`] is the narrow contract the coordinator consumes: lookup by
//! identity, full listing, save (assigning identity when absent), cascading
//! delete, and attribute-filtered queries with optional ordering by creation
//! time. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local map, used by tests and embedders
//! - [`JsonStore`]: a single JSON document on disk, guarded by a file lock
//!
//! ```text
//! .tasktree/
//!   tasks.json          # { schema_version, next_id, tasks: [...] }
//!   tasks.json.lock     # advisory lock held for every read/modify/write
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{Task, TaskId};

pub const STORE_SCHEMA_VERSION: &str = "tasktree.store.v1";

/// Ordering by creation time; ties break on identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(Error::InvalidArgument(format!(
                "invalid sort order '{other}' (expected asc|desc)"
            ))),
        }
    }
}

/// Attribute filter for store queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    Status(String),
    Priority(String),
    Type(String),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::Status(status) => task.status == *status,
            TaskFilter::Priority(priority) => task.priority.as_deref() == Some(priority.as_str()),
            TaskFilter::Type(kind) => task.kind.as_deref() == Some(kind.as_str()),
        }
    }
}

pub fn sort_tasks(tasks: &mut [Task], order: SortOrder) {
    tasks.sort_by(|left, right| {
        let ordering = left
            .created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

pub trait TaskStore: Send + Sync {
    fn find_by_id(&self, id: TaskId) -> Result<Option<Task>>;

    /// All rows, ascending by identity.
    fn find_all(&self) -> Result<Vec<Task>>;

    /// Insert (assigning the next identity) or overwrite the row with the
    /// task's identity. Returns the stored value.
    fn save(&self, task: Task) -> Result<Task>;

    /// Delete the row and, transitively, every row whose parent it was.
    /// Returns the identities removed; deleting an unknown id removes nothing.
    fn delete_by_id(&self, id: TaskId) -> Result<Vec<TaskId>>;

    fn find_by(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut tasks = self.find_all()?;
        tasks.retain(|task| filter.matches(task));
        Ok(tasks)
    }

    fn find_by_sorted(&self, filter: &TaskFilter, order: SortOrder) -> Result<Vec<Task>> {
        let mut tasks = self.find_by(filter)?;
        sort_tasks(&mut tasks, order);
        Ok(tasks)
    }

    fn find_by_status(&self, status: &str) -> Result<Vec<Task>> {
        self.find_by(&TaskFilter::Status(status.to_string()))
    }

    fn find_by_status_sorted(&self, status: &str, order: SortOrder) -> Result<Vec<Task>> {
        self.find_by_sorted(&TaskFilter::Status(status.to_string()), order)
    }

    fn find_by_priority(&self, priority: &str) -> Result<Vec<Task>> {
        self.find_by(&TaskFilter::Priority(priority.to_string()))
    }

    fn find_by_priority_sorted(&self, priority: &str, order: SortOrder) -> Result<Vec<Task>> {
        self.find_by_sorted(&TaskFilter::Priority(priority.to_string()), order)
    }

    fn find_by_type(&self, kind: &str) -> Result<Vec<Task>> {
        self.find_by(&TaskFilter::Type(kind.to_string()))
    }

    fn find_by_type_sorted(&self, kind: &str, order: SortOrder) -> Result<Vec<Task>> {
        self.find_by_sorted(&TaskFilter::Type(kind.to_string()), order)
    }
}

impl<S: TaskStore + ?Sized> TaskStore for std::sync::Arc<S> {
    fn find_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> Result<Vec<Task>> {
        (**self).find_all()
    }

    fn save(&self, task: Task) -> Result<Task> {
        (**self).save(task)
    }

    fn delete_by_id(&self, id: TaskId) -> Result<Vec<TaskId>> {
        (**self).delete_by_id(id)
    }
}

/// Rows plus the identity counter; shared by both implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskTable {
    schema_version: String,
    next_id: TaskId,
    tasks: Vec<Task>,
    #[serde(skip)]
    rows: BTreeMap<TaskId, Task>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION.to_string(),
            next_id: TaskId::new(1),
            tasks: Vec::new(),
            rows: BTreeMap::new(),
        }
    }
}

impl TaskTable {
    fn from_document(mut doc: TaskTable) -> Result<Self> {
        let mut rows = BTreeMap::new();
        for task in doc.tasks.drain(..) {
            let id = task.id.ok_or_else(|| {
                Error::OperationFailed(format!("stored task '{}' has no id", task.title))
            })?;
            if id >= doc.next_id {
                doc.next_id = id.next();
            }
            rows.insert(id, task);
        }
        doc.rows = rows;
        Ok(doc)
    }

    fn to_document(&self) -> TaskTable {
        TaskTable {
            schema_version: self.schema_version.clone(),
            next_id: self.next_id,
            tasks: self.rows.values().cloned().collect(),
            rows: BTreeMap::new(),
        }
    }

    fn get(&self, id: TaskId) -> Option<Task> {
        self.rows.get(&id).cloned()
    }

    fn all(&self) -> Vec<Task> {
        self.rows.values().cloned().collect()
    }

    fn save(&mut self, mut task: Task) -> Result<Task> {
        let id = match task.id {
            Some(id) => id,
            None => {
                let id = self.next_id;
                task.id = Some(id);
                id
            }
        };
        if task.is_self_parented() {
            return Err(Error::InvalidArgument(format!(
                "task {id} cannot be its own parent"
            )));
        }
        if id >= self.next_id {
            self.next_id = id.next();
        }
        self.rows.insert(id, task.clone());
        Ok(task)
    }

    fn delete_cascade(&mut self, id: TaskId) -> Vec<TaskId> {
        if !self.rows.contains_key(&id) {
            return Vec::new();
        }

        let mut doomed = BTreeSet::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            if !doomed.insert(current) {
                continue;
            }
            frontier.extend(
                self.rows
                    .values()
                    .filter(|task| task.parent_id == Some(current))
                    .filter_map(|task| task.id),
            );
        }

        for doomed_id in &doomed {
            self.rows.remove(doomed_id);
        }
        doomed.into_iter().collect()
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<TaskTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with rows as given, identities included.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let store = Self::new();
        for task in tasks {
            store.save(task)?;
        }
        Ok(store)
    }

    fn table(&self) -> MutexGuard<'_, TaskTable> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryStore {
    fn find_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.table().get(id))
    }

    fn find_all(&self) -> Result<Vec<Task>> {
        Ok(self.table().all())
    }

    fn save(&self, task: Task) -> Result<Task> {
        self.table().save(task)
    }

    fn delete_by_id(&self, id: TaskId) -> Result<Vec<TaskId>> {
        Ok(self.table().delete_cascade(id))
    }
}

/// File-backed store: one JSON document rewritten atomically per mutation.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock_timeout_ms: u64,
    // Serializes threads of this process before they contend on the file lock.
    local: Mutex<()>,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            local: Mutex::new(()),
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read<T>(&self, f: impl FnOnce(&TaskTable) -> T) -> Result<T> {
        let _local = self.local.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        let table = self.load()?;
        Ok(f(&table))
    }

    fn modify<T>(&self, f: impl FnOnce(&mut TaskTable) -> Result<T>) -> Result<T> {
        let _local = self.local.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        let mut table = self.load()?;
        let value = f(&mut table)?;
        let json = serde_json::to_vec_pretty(&table.to_document())?;
        lock::write_atomic(&self.path, &json)?;
        Ok(value)
    }

    fn load(&self) -> Result<TaskTable> {
        if !self.path.exists() {
            return Ok(TaskTable::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(TaskTable::default());
        }
        let doc: TaskTable = serde_json::from_str(&content)?;
        if doc.schema_version != STORE_SCHEMA_VERSION {
            return Err(Error::OperationFailed(format!(
                "unsupported store schema '{}' in {}",
                doc.schema_version,
                self.path.display()
            )));
        }
        TaskTable::from_document(doc)
    }
}

impl TaskStore for JsonStore {
    fn find_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.read(|table| table.get(id))
    }

    fn find_all(&self) -> Result<Vec<Task>> {
        self.read(TaskTable::all)
    }

    fn save(&self, task: Task) -> Result<Task> {
        let saved = self.modify(|table| table.save(task))?;
        debug!(path = %self.path.display(), id = ?saved.id, "task saved");
        Ok(saved)
    }

    fn delete_by_id(&self, id: TaskId) -> Result<Vec<TaskId>> {
        let removed = self.modify(|table| Ok(table.delete_cascade(id)))?;
        debug!(path = %self.path.display(), %id, removed = removed.len(), "task deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn child_of(title: &str, parent: TaskId) -> Task {
        Task::new(title).with_parent(parent)
    }

    #[test]
    fn save_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.save(Task::new("a")).expect("save a");
        let b = store.save(Task::new("b")).expect("save b");
        assert_eq!(a.id, Some(TaskId::new(1)));
        assert_eq!(b.id, Some(TaskId::new(2)));
        assert_eq!(store.find_all().expect("all").len(), 2);
    }

    #[test]
    fn save_with_id_overwrites_and_never_reissues() {
        let store = MemoryStore::new();
        let mut a = store.save(Task::new("a")).expect("save");
        a.title = "renamed".to_string();
        store.save(a.clone()).expect("overwrite");
        assert_eq!(
            store.find_by_id(TaskId::new(1)).expect("find").map(|t| t.title),
            Some("renamed".to_string())
        );

        let mut restored = Task::new("restored");
        restored.id = Some(TaskId::new(10));
        store.save(restored).expect("restore");
        let next = store.save(Task::new("next")).expect("next");
        assert_eq!(next.id, Some(TaskId::new(11)));
    }

    #[test]
    fn save_rejects_self_parent() {
        let store = MemoryStore::new();
        let mut task = Task::new("loop").with_parent(TaskId::new(3));
        task.id = Some(TaskId::new(3));
        let err = store.save(task).expect_err("self parent");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn delete_cascades_to_descendants() {
        let store = MemoryStore::new();
        let root = store.save(Task::new("root")).expect("root");
        let root_id = root.id.expect("id");
        let child = store.save(child_of("child", root_id)).expect("child");
        let grandchild = store
            .save(child_of("grandchild", child.id.expect("id")))
            .expect("grandchild");
        let other = store.save(Task::new("other")).expect("other");

        let removed = store.delete_by_id(root_id).expect("delete");
        assert_eq!(
            removed,
            vec![root_id, child.id.expect("id"), grandchild.id.expect("id")]
        );
        let remaining = store.find_all().expect("all");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, other.id);
        assert!(store.delete_by_id(root_id).expect("again").is_empty());
    }

    #[test]
    fn filtered_queries_sort_by_creation_time() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut older = Task::new("older").with_priority("HIGH").with_kind("bug");
        older.created_at = now - Duration::minutes(5);
        let mut newer = Task::new("newer").with_priority("HIGH").with_kind("feature");
        newer.created_at = now;
        let low = Task::new("low").with_priority("LOW").with_status("IN_PROGRESS");
        store.save(newer).expect("newer");
        store.save(older).expect("older");
        store.save(low).expect("low");

        let asc = store
            .find_by_priority_sorted("HIGH", SortOrder::Asc)
            .expect("asc");
        assert_eq!(
            asc.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["older", "newer"]
        );
        let desc = store
            .find_by_priority_sorted("HIGH", SortOrder::Desc)
            .expect("desc");
        assert_eq!(desc[0].title, "newer");

        assert_eq!(store.find_by_type("bug").expect("type").len(), 1);
        assert_eq!(store.find_by_status("PENDING").expect("status").len(), 2);
        assert_eq!(
            store
                .find_by_status_sorted("IN_PROGRESS", SortOrder::Desc)
                .expect("status sorted")[0]
                .title,
            "low"
        );
    }

    #[test]
    fn sort_order_parse() {
        assert_eq!(SortOrder::parse("ASC").expect("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("descending").expect("desc"), SortOrder::Desc);
        assert!(SortOrder::parse("sideways").is_err());
    }

    #[test]
    fn json_store_persists_across_instances() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".tasktree").join("tasks.json");

        let store = JsonStore::open(&path);
        let root = store.save(Task::new("root")).expect("save");
        let root_id = root.id.expect("id");
        store.save(child_of("child", root_id)).expect("child");
        drop(store);

        let reopened = JsonStore::open(&path);
        let all = reopened.find_all().expect("all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].parent_id, Some(root_id));

        let next = reopened.save(Task::new("third")).expect("third");
        assert_eq!(next.id, Some(TaskId::new(3)));

        reopened.delete_by_id(root_id).expect("delete");
        assert_eq!(reopened.find_all().expect("all").len(), 1);
    }

    #[test]
    fn json_store_missing_file_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("absent.json"));
        assert!(store.find_all().expect("all").is_empty());
        assert!(store.find_by_id(TaskId::new(1)).expect("find").is_none());
    }

    #[test]
    fn json_store_rejects_unknown_schema() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"{"schema_version":"other.v9","next_id":1,"tasks":[]}"#,
        )
        .expect("write");
        let err = JsonStore::open(&path).find_all().expect_err("schema");
        assert!(matches!(err, Error::OperationFailed(_)));
    }
}
