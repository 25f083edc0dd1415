//! Metric recording for scheduler operations.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics with the scheduler's
//! name as label, so each scheduler instance reports its own series.

use std::time::Duration;

use super::prometheus::{
    DISPATCH_DURATION, IN_FLIGHT_UNITS, QUEUE_DEPTH, TASKS_SUBMITTED, UNITS_COMPLETED,
};

/// Records metrics for one scheduler.
///
/// Every method is a no-op until [`init_metrics`](super::init_metrics) has run.
///
/// # Example
///
/// ```ignore
/// use taskq::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new("ingest");
/// collector.record_submitted(3);
/// collector.update_queue_depth(3);
/// ```
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    scheduler: String,
}

impl MetricsCollector {
    /// Create a collector labelling everything with `scheduler`.
    pub fn new(scheduler: impl Into<String>) -> Self {
        Self {
            scheduler: scheduler.into(),
        }
    }

    /// Label value used for this collector's series.
    pub fn scheduler(&self) -> &str {
        &self.scheduler
    }

    /// Record newly submitted tasks.
    pub fn record_submitted(&self, count: usize) {
        if let Some(submitted) = TASKS_SUBMITTED.get() {
            submitted
                .with_label_values(&[self.scheduler.as_str()])
                .inc_by(count as f64);
        }
    }

    /// Record a resolved dispatch unit.
    ///
    /// # Arguments
    ///
    /// * `outcome` - "success", "retry" or "fault"
    /// * `mode` - "single" or "batch"
    /// * `duration` - How long the worker took
    pub fn record_dispatch(&self, outcome: &str, mode: &str, duration: Duration) {
        if let Some(completed) = UNITS_COMPLETED.get() {
            completed
                .with_label_values(&[self.scheduler.as_str(), outcome])
                .inc();
        }

        if let Some(histogram) = DISPATCH_DURATION.get() {
            histogram
                .with_label_values(&[self.scheduler.as_str(), mode])
                .observe(duration.as_secs_f64());
        }

        tracing::trace!(
            scheduler = %self.scheduler,
            outcome = outcome,
            mode = mode,
            duration_ms = duration.as_millis() as u64,
            "Recorded dispatch metric"
        );
    }

    /// Update the number of pending tasks.
    pub fn update_queue_depth(&self, depth: usize) {
        if let Some(queue_depth) = QUEUE_DEPTH.get() {
            queue_depth
                .with_label_values(&[self.scheduler.as_str()])
                .set(depth as f64);
        }
    }

    /// Update the number of in-flight dispatch units.
    pub fn update_in_flight(&self, units: usize) {
        if let Some(in_flight) = IN_FLIGHT_UNITS.get() {
            in_flight
                .with_label_values(&[self.scheduler.as_str()])
                .set(units as f64);
        }
    }
}
