use crate::types::PendingAssignment;
use overseer_types::TaskId;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Deadline ascending, then budget descending, then insertion order.
type QueueKey = (u64, Reverse<u64>, u64);

/// Priority queue of open tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: BTreeMap<QueueKey, TaskId>,
    keys: HashMap<TaskId, QueueKey>,
    sequence: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the task is already queued.
    pub fn push(&mut self, task: &PendingAssignment) -> bool {
        if self.keys.contains_key(&task.task_id) {
            return false;
        }
        let key = (task.deadline_ms, Reverse(task.budget), self.sequence);
        self.sequence += 1;
        self.entries.insert(key, task.task_id.clone());
        self.keys.insert(task.task_id.clone(), key);
        true
    }

    pub fn remove(&mut self, task_id: &TaskId) -> bool {
        match self.keys.remove(task_id) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.keys.contains_key(task_id)
    }

    /// Task ids in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskId> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
