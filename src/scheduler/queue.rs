//! Pending queue and in-flight set.
//!
//! The pending queue is FIFO for fresh submissions. Failed tasks are
//! requeued at the front so they are redelivered before anything that was
//! waiting behind them.
//!
//! The in-flight set tracks dispatch units (one task or one batch) that have
//! been handed to the worker and not yet resolved. A unit is removed exactly
//! once, when its outcome is known.

use std::collections::{BTreeMap, HashMap, VecDeque};

use super::task::{Batch, BatchId, Dispatch, Task, TaskId, UnitKey};

/// Ordered sequence of tasks awaiting dispatch.
#[derive(Debug)]
pub struct PendingQueue<T> {
    tasks: VecDeque<Task<T>>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Appends a freshly submitted task to the back of the queue.
    pub fn enqueue(&mut self, task: Task<T>) {
        self.tasks.push_back(task);
    }

    /// Puts failed tasks back at the front of the queue.
    ///
    /// The tasks keep their relative order and all precede whatever was
    /// already pending.
    pub fn requeue(&mut self, tasks: Vec<Task<T>>) {
        for task in tasks.into_iter().rev() {
            self.tasks.push_front(task);
        }
    }

    /// Removes and returns the front task.
    pub fn dequeue(&mut self) -> Option<Task<T>> {
        self.tasks.pop_front()
    }

    /// Removes up to `max` tasks from the front of the queue.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<Task<T>> {
        let count = max.min(self.tasks.len());
        self.tasks.drain(..count).collect()
    }

    /// Drops every pending task, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        removed
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids of the pending tasks, front first.
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }
}

/// Dispatch units currently handed to the worker.
#[derive(Debug)]
pub struct InFlight<T> {
    units: HashMap<UnitKey, Vec<Task<T>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> InFlight<T> {
    /// Records a single task as in flight and builds its dispatch.
    pub fn start_single(&mut self, mut task: Task<T>) -> Dispatch<T> {
        task.increment_attempts();
        let dispatch = Dispatch::Single(task.clone());
        self.units.insert(UnitKey::Task(task.id), vec![task]);
        dispatch
    }

    /// Records a bundle of tasks as one in-flight batch and builds its dispatch.
    pub fn start_batch(&mut self, id: BatchId, mut tasks: Vec<Task<T>>) -> Dispatch<T> {
        let mut payloads = BTreeMap::new();
        for task in &mut tasks {
            task.increment_attempts();
            payloads.insert(task.id, task.payload.clone());
        }
        self.units.insert(UnitKey::Batch(id), tasks);
        Dispatch::Batch(Batch {
            id,
            tasks: payloads,
        })
    }
}

impl<T> InFlight<T> {
    /// Creates an empty in-flight set.
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Removes a unit and returns its tasks.
    ///
    /// Returns `None` if the unit is not in flight (already resolved).
    pub fn complete(&mut self, key: UnitKey) -> Option<Vec<Task<T>>> {
        self.units.remove(&key)
    }

    /// Whether the unit is currently in flight.
    pub fn contains(&self, key: UnitKey) -> bool {
        self.units.contains_key(&key)
    }

    /// Number of in-flight dispatch units.
    pub fn units(&self) -> usize {
        self.units.len()
    }

    /// Number of tasks across all in-flight units.
    pub fn tasks(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(ids: &[u64]) -> Vec<Task<u64>> {
        ids.iter().map(|&i| Task::new(TaskId(i), i * 10)).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PendingQueue::new();
        for task in tasks(&[0, 1, 2]) {
            queue.enqueue(task);
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().map(|t| t.id), Some(TaskId(0)));
        assert_eq!(queue.dequeue().map(|t| t.id), Some(TaskId(1)));
        assert_eq!(queue.dequeue().map(|t| t.id), Some(TaskId(2)));
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_goes_to_front_in_order() {
        let mut queue = PendingQueue::new();
        for task in tasks(&[5, 6]) {
            queue.enqueue(task);
        }

        queue.requeue(tasks(&[1, 2, 3]));

        assert_eq!(
            queue.ids(),
            vec![TaskId(1), TaskId(2), TaskId(3), TaskId(5), TaskId(6)]
        );
    }

    #[test]
    fn test_dequeue_batch_caps_at_len() {
        let mut queue = PendingQueue::new();
        for task in tasks(&[0, 1]) {
            queue.enqueue(task);
        }

        let batch = queue.dequeue_batch(5);
        assert_eq!(batch.len(), 2);
        assert!(queue.is_empty());
        assert!(queue.dequeue_batch(3).is_empty());
    }

    #[test]
    fn test_clear_reports_removed() {
        let mut queue = PendingQueue::new();
        for task in tasks(&[0, 1, 2, 3]) {
            queue.enqueue(task);
        }

        assert_eq!(queue.clear(), 4);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_in_flight_single_lifecycle() {
        let mut in_flight = InFlight::new();
        let task = Task::new(TaskId(4), 40u64);

        let dispatch = in_flight.start_single(task);
        let key = dispatch.key();

        assert_eq!(key, UnitKey::Task(TaskId(4)));
        assert!(in_flight.contains(key));
        assert_eq!(in_flight.units(), 1);
        assert_eq!(in_flight.tasks(), 1);

        let done = in_flight.complete(key).expect("unit should be in flight");
        assert_eq!(done[0].attempts, 1);
        assert!(in_flight.is_empty());
        assert!(in_flight.complete(key).is_none());
    }

    #[test]
    fn test_in_flight_batch_counts_one_unit() {
        let mut in_flight = InFlight::new();

        let dispatch = in_flight.start_batch(BatchId(0), tasks(&[0, 1, 2]));

        assert_eq!(in_flight.units(), 1);
        assert_eq!(in_flight.tasks(), 3);

        let batch = dispatch.into_batch().expect("should be a batch");
        assert_eq!(batch.tasks.get(&TaskId(2)), Some(&20));

        let done = in_flight
            .complete(UnitKey::Batch(BatchId(0)))
            .expect("batch should be in flight");
        assert!(done.iter().all(|t| t.attempts == 1));
    }
}
