//! Scheduler statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Tasks waiting for dispatch.
    pub pending: usize,
    /// Dispatch units handed to the worker and not yet resolved.
    pub in_flight_units: usize,
    /// Tasks across all in-flight units.
    pub in_flight_tasks: usize,
    /// Current concurrency limit.
    pub concurrency: usize,
    /// Whether the scheduler is paused.
    pub paused: bool,
    /// Total tasks submitted.
    pub submitted: u64,
    /// Dispatch units the worker resolved with `Ok`.
    pub completed: u64,
    /// Dispatch units the worker failed (and that were requeued).
    pub failed: u64,
    /// Dispatch units dropped because the worker broke its contract.
    pub faulted: u64,
    /// Average worker duration per dispatch unit.
    #[serde(with = "duration_millis")]
    pub average_dispatch_duration: Duration,
}

impl SchedulerStats {
    /// Returns the total number of resolved dispatch units.
    pub fn total_processed(&self) -> u64 {
        self.completed + self.failed + self.faulted
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.completed as f64 / total as f64) * 100.0
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Running counters shared with in-flight completion tasks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    faulted: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl Counters {
    pub(crate) fn record_submitted(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn record_completion(&self, duration: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.add_duration(duration);
    }

    pub(crate) fn record_failure(&self, duration: Duration) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.add_duration(duration);
    }

    pub(crate) fn record_fault(&self, duration: Duration) {
        self.faulted.fetch_add(1, Ordering::SeqCst);
        self.add_duration(duration);
    }

    fn add_duration(&self, duration: Duration) {
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fills the counter fields of a snapshot.
    pub(crate) fn fill(&self, stats: &mut SchedulerStats) {
        stats.submitted = self.submitted.load(Ordering::SeqCst);
        stats.completed = self.completed.load(Ordering::SeqCst);
        stats.failed = self.failed.load(Ordering::SeqCst);
        stats.faulted = self.faulted.load(Ordering::SeqCst);

        let total = stats.total_processed();
        stats.average_dispatch_duration = if total > 0 {
            Duration::from_millis(self.total_duration_ms.load(Ordering::SeqCst) / total)
        } else {
            Duration::ZERO
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = SchedulerStats::default();

        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_processed(), 0);
        assert_eq!(stats.average_dispatch_duration, Duration::ZERO);
        assert!((stats.success_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_calculations() {
        let stats = SchedulerStats {
            completed: 75,
            failed: 20,
            faulted: 5,
            ..Default::default()
        };

        assert_eq!(stats.total_processed(), 100);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counters_fill() {
        let counters = Counters::default();
        counters.record_submitted(4);
        counters.record_completion(Duration::from_millis(100));
        counters.record_completion(Duration::from_millis(200));
        counters.record_failure(Duration::from_millis(300));

        let mut stats = SchedulerStats::default();
        counters.fill(&mut stats);

        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.faulted, 0);
        assert_eq!(stats.average_dispatch_duration, Duration::from_millis(200));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = SchedulerStats {
            pending: 3,
            average_dispatch_duration: Duration::from_millis(1500),
            ..Default::default()
        };

        let json = serde_json::to_value(&stats).expect("serialization should work");
        assert_eq!(json["pending"], 3);
        assert_eq!(json["average_dispatch_duration"], 1500);
    }
}
