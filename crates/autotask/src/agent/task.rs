//! Tasks, the pending queue and the completed log

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Numeric task identifier
pub type TaskId = u64;

/// An atomic unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub task_name: String,
}

impl Task {
    pub fn new(task_id: TaskId, task_name: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.task_id, self.task_name)
    }
}

/// Pending tasks; the front is the highest priority
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue seeded with a single task
    pub fn seeded(task: Task) -> Self {
        let mut queue = Self::new();
        queue.push(task);
        queue
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove and return the highest-priority task
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Replace the whole queue, keeping the given order
    pub fn replace(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks = tasks.into_iter().collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks.iter().cloned().collect()
    }
}

/// Names of executed tasks in completion order. Append-only.
#[derive(Debug, Clone, Default)]
pub struct CompletedLog {
    names: Vec<String>,
}

impl CompletedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task: &Task) {
        self.names.push(task.task_name.clone());
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
