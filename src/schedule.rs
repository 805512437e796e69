//! FIFO holding area for tasks awaiting processing.
//!
//! Entries are task snapshots, independent of the hierarchy. No reordering
//! happens here; classification-based filtering belongs to the store.

use std::collections::VecDeque;

use crate::model::Task;

#[derive(Debug, Clone, Default)]
pub struct ScheduledQueue {
    entries: VecDeque<Task>,
}

impl ScheduledQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: Task) {
        self.entries.push_back(task);
    }

    pub fn dequeue(&mut self) -> Option<Task> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&Task> {
        self.entries.front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter()
    }
}
