//! taskq: in-process task scheduling with bounded concurrency.
//!
//! This library queues opaque payloads and hands them to a single async
//! worker, one at a time or in batches, retrying failures ahead of newer work.

// Core modules
pub mod error;
pub mod metrics;
pub mod scheduler;

// Re-export commonly used types
pub use error::{ConfigError, SchedulerError, SchedulerResult};
pub use scheduler::{
    worker_fn, Dispatch, Scheduler, SchedulerConfig, SchedulerEvent, SchedulerStats, TaskId,
    UnitKey, Worker,
};
