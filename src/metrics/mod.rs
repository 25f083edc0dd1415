//! Metrics module for Prometheus-based monitoring.
//!
//! Schedulers record submissions, queue depth, in-flight units and worker
//! durations here once [`init_metrics`] has been called.
//!
//! # Example
//!
//! ```ignore
//! use taskq::metrics::{init_metrics, export_metrics};
//!
//! // Initialize metrics on startup
//! init_metrics().expect("Failed to initialize metrics");
//!
//! // ... run schedulers ...
//!
//! // Export metrics for Prometheus scraping
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    DISPATCH_DURATION, IN_FLIGHT_UNITS, QUEUE_DEPTH, REGISTRY, TASKS_SUBMITTED, UNITS_COMPLETED,
};
