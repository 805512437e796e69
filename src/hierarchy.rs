//! In-memory parent/child mirror of persisted tasks.
//!
//! Nodes live in a single identity map owned by the tree. A node records its
//! parent as an identity (looked up through the map, never owned) and the
//! ordered set of its children's identities. Removing a node removes its
//! whole subtree, matching the store's cascading delete.
//!
//! Traversal order is deterministic: roots ascending by identity, then each
//! node before its children, children ascending by identity.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{Task, TaskId};

/// A task together with its position in the tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    task: Task,
    parent: Option<TaskId>,
    children: BTreeSet<TaskId>,
}

impl TreeNode {
    fn new(task: Task, parent: Option<TaskId>) -> Self {
        Self {
            task,
            parent,
            children: BTreeSet::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.children.iter().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Result of [`HierarchyTree::insert`]. Only `Inserted` changes the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The named parent is not in the tree (yet).
    UnresolvedParent(TaskId),
    /// The task has no identity.
    MissingId,
    /// The task names itself as parent.
    SelfParent,
    /// A node with this identity already exists.
    Duplicate,
}

/// Result of [`HierarchyTree::relocate`]. Only `Moved` changes the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateOutcome {
    Moved,
    Unchanged,
    NotFound,
    UnresolvedParent(TaskId),
    /// The new parent is the node itself or one of its descendants.
    WouldCycle,
}

/// One row of a depth-annotated traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyEntry {
    pub depth: usize,
    pub task: Task,
}

/// Summary of a bulk rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    pub inserted: usize,
    /// Scans over the pending child set, including the final empty one.
    pub passes: usize,
    /// Children whose parent never resolved: orphans and cycle members.
    pub unresolved: Vec<Task>,
    /// Tasks rejected outright (no identity, duplicate, self-parented).
    pub skipped: Vec<Task>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyTree {
    nodes: BTreeMap<TaskId, TreeNode>,
    roots: BTreeSet<TaskId>,
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from tasks in arbitrary order.
    ///
    /// Roots go in first, then the pending children are scanned repeatedly,
    /// inserting every child whose parent is already present. The loop ends
    /// when a scan inserts nothing; what remains could not be attached.
    pub fn rebuild(tasks: impl IntoIterator<Item = Task>) -> (Self, RebuildReport) {
        let mut tree = Self::new();
        let mut report = RebuildReport::default();
        let mut pending = Vec::new();

        for task in tasks {
            match task.parent_id {
                None => match tree.insert(task.clone(), None) {
                    InsertOutcome::Inserted => report.inserted += 1,
                    _ => report.skipped.push(task),
                },
                Some(_) if task.id.is_none() || task.is_self_parented() => {
                    report.skipped.push(task)
                }
                Some(_) => pending.push(task),
            }
        }

        loop {
            report.passes += 1;
            let before = pending.len();
            let mut remaining = Vec::with_capacity(before);

            for task in pending {
                let parent = task.parent_id;
                match tree.insert(task.clone(), parent) {
                    InsertOutcome::Inserted => report.inserted += 1,
                    InsertOutcome::UnresolvedParent(_) => remaining.push(task),
                    _ => report.skipped.push(task),
                }
            }

            pending = remaining;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        report.unresolved = pending;
        (tree, report)
    }

    /// Register `task` as a root (no parent) or as a child of `parent`.
    ///
    /// The task's own `parent_id` is not consulted; callers pass the parent
    /// explicitly. The stored copy has `parent_id` set to match its position.
    pub fn insert(&mut self, mut task: Task, parent: Option<TaskId>) -> InsertOutcome {
        let Some(id) = task.id else {
            return InsertOutcome::MissingId;
        };
        if parent == Some(id) {
            return InsertOutcome::SelfParent;
        }
        if self.nodes.contains_key(&id) {
            return InsertOutcome::Duplicate;
        }

        match parent {
            Some(parent_id) => {
                let Some(parent_node) = self.nodes.get_mut(&parent_id) else {
                    return InsertOutcome::UnresolvedParent(parent_id);
                };
                parent_node.children.insert(id);
            }
            None => {
                self.roots.insert(id);
            }
        }

        task.parent_id = parent;
        self.nodes.insert(id, TreeNode::new(task, parent));
        InsertOutcome::Inserted
    }

    /// Detach and discard the node and its entire subtree.
    ///
    /// Returns the removed tasks in pre-order, empty when `id` is unknown.
    pub fn remove(&mut self, id: TaskId) -> Vec<Task> {
        let Some(parent) = self.nodes.get(&id).map(|node| node.parent) else {
            return Vec::new();
        };

        match parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                    parent_node.children.remove(&id);
                }
            }
            None => {
                self.roots.remove(&id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().rev().copied());
                removed.push(node.task);
            }
        }
        removed
    }

    pub fn find_node(&self, id: TaskId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.roots.iter().copied()
    }

    /// Every task currently in the tree, each before its children.
    pub fn flatten(&self) -> Vec<Task> {
        self.walk().into_iter().map(|entry| entry.task).collect()
    }

    /// Pre-order traversal annotated with depth (roots are depth 0).
    pub fn walk(&self) -> Vec<HierarchyEntry> {
        let mut entries = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(TaskId, usize)> =
            self.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            entries.push(HierarchyEntry {
                depth,
                task: node.task.clone(),
            });
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        entries
    }

    /// Replace the stored value of an existing node without moving it.
    ///
    /// The node keeps its tree parent; the stored `parent_id` follows the
    /// tree, not the incoming value. Returns false when `task` is not mirrored.
    pub fn refresh(&mut self, mut task: Task) -> bool {
        let Some(id) = task.id else {
            return false;
        };
        match self.nodes.get_mut(&id) {
            Some(node) => {
                task.parent_id = node.parent;
                node.task = task;
                true
            }
            None => false,
        }
    }

    /// Move a node (with its subtree) under `new_parent`, or to the roots.
    pub fn relocate(&mut self, id: TaskId, new_parent: Option<TaskId>) -> RelocateOutcome {
        let Some(current_parent) = self.nodes.get(&id).map(|node| node.parent) else {
            return RelocateOutcome::NotFound;
        };
        if current_parent == new_parent {
            return RelocateOutcome::Unchanged;
        }
        if let Some(parent_id) = new_parent {
            if parent_id == id || self.is_descendant(id, parent_id) {
                return RelocateOutcome::WouldCycle;
            }
            if !self.nodes.contains_key(&parent_id) {
                return RelocateOutcome::UnresolvedParent(parent_id);
            }
        }

        match current_parent {
            Some(old) => {
                if let Some(old_node) = self.nodes.get_mut(&old) {
                    old_node.children.remove(&id);
                }
            }
            None => {
                self.roots.remove(&id);
            }
        }
        match new_parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                    parent_node.children.insert(id);
                }
            }
            None => {
                self.roots.insert(id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
            node.task.parent_id = new_parent;
        }
        RelocateOutcome::Moved
    }

    /// True when `id` lies strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: TaskId, id: TaskId) -> bool {
        let mut current = self.nodes.get(&id).and_then(|node| node.parent);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(&parent).and_then(|node| node.parent);
        }
        false
    }
}
