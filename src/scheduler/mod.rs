//! In-process task scheduling with bounded concurrency.
//!
//! Producers submit payloads; a single registered worker consumes them either
//! one at a time or bundled into batches. At most `concurrency` dispatch units
//! are in flight at once, and a unit whose worker fails goes back to the front
//! of the queue to be retried before anything newer.
//!
//! - **Scheduler**: the queue, dispatch loop and control surface
//! - **Worker**: the consumer seam, as a trait or a closure via [`worker_fn`]
//! - **SchedulerEvent**: every state change, published on a broadcast channel
//!
//! # Architecture
//!
//! ```text
//!   submit ──► ┌──────────────┐  pass   ┌───────────┐  spawn  ┌────────┐
//!              │ PendingQueue │ ──────► │ InFlight  │ ──────► │ Worker │
//!              └──────▲───────┘         └─────┬─────┘         └───┬────┘
//!                     │   requeue on failure  │    completion     │
//!                     └───────────────────────┴◄──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use taskq::scheduler::{worker_fn, Dispatch, Scheduler, SchedulerEvent};
//!
//! let scheduler: Scheduler<String> = Scheduler::new();
//! scheduler.set_worker(worker_fn(|dispatch: Dispatch<String>| async move {
//!     for id in dispatch.task_ids() {
//!         tracing::info!(task_id = %id, "processing");
//!     }
//!     anyhow::Ok(())
//! }));
//! scheduler.set_concurrency(4)?;
//!
//! let mut events = scheduler.subscribe();
//! scheduler.resume()?;
//! scheduler.submit("hello".to_string());
//!
//! while let Ok(event) = events.recv().await {
//!     if let SchedulerEvent::TaskComplete(unit) = event {
//!         println!("{} done", unit);
//!     }
//! }
//! ```

pub mod config;
pub mod engine;
pub mod events;
pub mod queue;
pub mod stats;
pub mod task;
pub mod worker;

mod ticker;

pub use config::{
    check_concurrency, check_group_size, parse_bool, parse_concurrency, parse_group_size,
    SchedulerConfig, DEFAULT_CONCURRENCY, DEFAULT_EVENT_CAPACITY, DEFAULT_GROUP_SIZE,
    DEFAULT_TICK_INTERVAL,
};
pub use engine::{Scheduler, NO_WORKER_NOTICE};
pub use events::{EventBus, SchedulerEvent};
pub use queue::{InFlight, PendingQueue};
pub use stats::SchedulerStats;
pub use task::{Batch, BatchId, Dispatch, Task, TaskId, UnitKey};
pub use worker::{worker_fn, FnWorker, Outcome, Worker};
