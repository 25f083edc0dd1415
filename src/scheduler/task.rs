//! Task definitions for the scheduler.
//!
//! This module defines the core unit types used in the scheduling system:
//!
//! - `Task`: A submitted unit of work with a stable id
//! - `Batch`: A bundle of tasks delivered to the worker in one invocation
//! - `Dispatch`: What the worker receives (one task or one batch)
//! - `UnitKey`: Identifies an in-flight dispatch unit

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a task on submission.
///
/// Ids increase monotonically per scheduler and never change across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a batch when it is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work waiting for, or handed to, the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task<T> {
    /// Stable identifier for this task.
    pub id: TaskId,
    /// Caller-supplied payload.
    pub payload: T,
    /// When this task was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Number of times this task has been dispatched.
    pub attempts: u32,
}

impl<T> Task<T> {
    /// Creates a new task that has not been attempted yet.
    pub fn new(id: TaskId, payload: T) -> Self {
        Self {
            id,
            payload,
            submitted_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Increments the attempt counter.
    ///
    /// Called each time the task is handed to the worker.
    pub fn increment_attempts(&mut self) {
        self.attempts += 1;
    }

    /// Returns whether this task has already failed at least once.
    pub fn is_retry(&self) -> bool {
        self.attempts > 1
    }

    /// Returns how long ago the task was submitted.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.submitted_at
    }
}

/// A bundle of tasks delivered to the worker in a single invocation.
///
/// Payloads are keyed by task id, so iteration order is submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch<T> {
    /// Identifier of this dispatch.
    pub id: BatchId,
    /// Payload of every task in the batch, keyed by task id.
    pub tasks: BTreeMap<TaskId, T>,
}

impl<T> Batch<T> {
    /// Number of tasks in the batch.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the batch carries no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids of the tasks in the batch, in ascending order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }
}

/// What a worker receives for one invocation.
#[derive(Debug, Clone)]
pub enum Dispatch<T> {
    /// Ungrouped mode: a single task.
    Single(Task<T>),
    /// Grouped mode: a bundle of tasks.
    Batch(Batch<T>),
}

impl<T> Dispatch<T> {
    /// Key identifying this dispatch while it is in flight.
    pub fn key(&self) -> UnitKey {
        match self {
            Dispatch::Single(task) => UnitKey::Task(task.id),
            Dispatch::Batch(batch) => UnitKey::Batch(batch.id),
        }
    }

    /// Ids of every task carried by this dispatch.
    pub fn task_ids(&self) -> Vec<TaskId> {
        match self {
            Dispatch::Single(task) => vec![task.id],
            Dispatch::Batch(batch) => batch.task_ids(),
        }
    }

    /// Number of tasks carried by this dispatch.
    pub fn len(&self) -> usize {
        match self {
            Dispatch::Single(_) => 1,
            Dispatch::Batch(batch) => batch.len(),
        }
    }

    /// Whether the dispatch carries no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the single task, if this is an ungrouped dispatch.
    pub fn into_single(self) -> Option<Task<T>> {
        match self {
            Dispatch::Single(task) => Some(task),
            Dispatch::Batch(_) => None,
        }
    }

    /// Returns the batch, if this is a grouped dispatch.
    pub fn into_batch(self) -> Option<Batch<T>> {
        match self {
            Dispatch::Single(_) => None,
            Dispatch::Batch(batch) => Some(batch),
        }
    }
}

/// Identifies one in-flight dispatch unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKey {
    /// A single task dispatched in ungrouped mode.
    Task(TaskId),
    /// A batch dispatched in grouped mode.
    Batch(BatchId),
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKey::Task(id) => write!(f, "task {}", id),
            UnitKey::Batch(id) => write!(f, "batch {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let task = Task::new(TaskId(3), "payload");

        assert_eq!(task.id, TaskId(3));
        assert_eq!(task.payload, "payload");
        assert_eq!(task.attempts, 0);
        assert!(!task.is_retry());
        assert!(task.age() >= chrono::Duration::zero());
    }

    #[test]
    fn test_task_increment_attempts() {
        let mut task = Task::new(TaskId(0), ());

        task.increment_attempts();
        assert_eq!(task.attempts, 1);
        assert!(!task.is_retry());

        task.increment_attempts();
        assert_eq!(task.attempts, 2);
        assert!(task.is_retry());
    }

    #[test]
    fn test_dispatch_single() {
        let dispatch = Dispatch::Single(Task::new(TaskId(5), 42));

        assert_eq!(dispatch.key(), UnitKey::Task(TaskId(5)));
        assert_eq!(dispatch.task_ids(), vec![TaskId(5)]);
        assert_eq!(dispatch.len(), 1);
        assert_eq!(dispatch.clone().into_single().map(|t| t.payload), Some(42));
        assert!(dispatch.into_batch().is_none());
    }

    #[test]
    fn test_dispatch_batch_orders_by_id() {
        let mut tasks = BTreeMap::new();
        tasks.insert(TaskId(9), "c");
        tasks.insert(TaskId(2), "a");
        tasks.insert(TaskId(4), "b");
        let dispatch = Dispatch::Batch(Batch {
            id: BatchId(1),
            tasks,
        });

        assert_eq!(dispatch.key(), UnitKey::Batch(BatchId(1)));
        assert_eq!(dispatch.task_ids(), vec![TaskId(2), TaskId(4), TaskId(9)]);
        assert_eq!(dispatch.len(), 3);

        let batch = dispatch.into_batch().expect("should be a batch");
        let payloads: Vec<_> = batch.tasks.values().copied().collect();
        assert_eq!(payloads, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unit_key_display() {
        assert_eq!(UnitKey::Task(TaskId(12)).to_string(), "task 12");
        assert_eq!(UnitKey::Batch(BatchId(3)).to_string(), "batch 3");
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::new(TaskId(1), "hello".to_string());

        let json = serde_json::to_string(&task).expect("serialization should work");
        let parsed: Task<String> = serde_json::from_str(&json).expect("deserialization should work");

        assert_eq!(parsed.id, task.id);
        assert_eq!(parsed.payload, task.payload);
        assert!(json.contains("\"id\":1"));
    }
}
