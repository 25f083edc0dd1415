//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by taskq and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all taskq metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total number of tasks submitted, labeled by scheduler.
pub static TASKS_SUBMITTED: OnceLock<CounterVec> = OnceLock::new();

/// Total dispatch units resolved, labeled by scheduler and outcome
/// (success, retry, fault).
pub static UNITS_COMPLETED: OnceLock<CounterVec> = OnceLock::new();

/// Number of pending tasks, labeled by scheduler.
pub static QUEUE_DEPTH: OnceLock<GaugeVec> = OnceLock::new();

/// Number of in-flight dispatch units, labeled by scheduler.
pub static IN_FLIGHT_UNITS: OnceLock<GaugeVec> = OnceLock::new();

/// Worker duration per dispatch unit in seconds, labeled by scheduler and
/// mode (single, batch).
pub static DISPATCH_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at application startup. Schedulers created before this call
/// record nothing; recording is a no-op until the metrics exist.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let tasks_submitted = CounterVec::new(
        Opts::new("taskq_tasks_submitted_total", "Total number of tasks submitted"),
        &["scheduler"],
    )?;

    let units_completed = CounterVec::new(
        Opts::new(
            "taskq_units_completed_total",
            "Total dispatch units resolved by the worker",
        ),
        &["scheduler", "outcome"],
    )?;

    let queue_depth = GaugeVec::new(
        Opts::new("taskq_queue_depth", "Number of tasks waiting for dispatch"),
        &["scheduler"],
    )?;

    let in_flight_units = GaugeVec::new(
        Opts::new(
            "taskq_in_flight_units",
            "Number of dispatch units handed to the worker",
        ),
        &["scheduler"],
    )?;

    let dispatch_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "taskq_dispatch_duration_seconds",
            "Worker duration per dispatch unit in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["scheduler", "mode"],
    )?;

    registry.register(Box::new(tasks_submitted.clone()))?;
    registry.register(Box::new(units_completed.clone()))?;
    registry.register(Box::new(queue_depth.clone()))?;
    registry.register(Box::new(in_flight_units.clone()))?;
    registry.register(Box::new(dispatch_duration.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = TASKS_SUBMITTED.set(tasks_submitted);
    let _ = UNITS_COMPLETED.set(units_completed);
    let _ = QUEUE_DEPTH.set(queue_depth);
    let _ = IN_FLIGHT_UNITS.set(in_flight_units);
    let _ = DISPATCH_DURATION.set(dispatch_duration);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, the returned
/// text is a single comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
