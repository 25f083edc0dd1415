//! Scheduler events.
//!
//! Every observable state change is published on a broadcast channel.
//! Subscribers that fall more than the channel capacity behind will see
//! `RecvError::Lagged` and skip ahead.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::SchedulerError;

use super::task::UnitKey;

/// An event emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A configuration mistake or a worker contract violation.
    Error(SchedulerError),
    /// Human-readable notice (missing worker, retried failure).
    Status(String),
    /// A dispatch unit was resolved, successfully or by requeueing.
    TaskComplete(UnitKey),
    /// A worker was registered.
    WorkerRegistered,
    /// The concurrency limit changed.
    ConcurrencyChanged(usize),
    /// Grouped dispatch was switched on or off.
    GroupingChanged(bool),
    /// The group size changed.
    GroupSizeChanged(usize),
    /// The scheduler stopped starting new dispatches.
    Paused,
    /// The scheduler started dispatching again.
    Resumed,
    /// The pending queue is about to be emptied.
    Clearing,
    /// The pending queue was emptied.
    Cleared,
}

impl SchedulerEvent {
    /// Short stable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::Error(_) => "error",
            SchedulerEvent::Status(_) => "status",
            SchedulerEvent::TaskComplete(_) => "task-complete",
            SchedulerEvent::WorkerRegistered => "worker-registered",
            SchedulerEvent::ConcurrencyChanged(_) => "concurrency-changed",
            SchedulerEvent::GroupingChanged(_) => "grouping-changed",
            SchedulerEvent::GroupSizeChanged(_) => "group-size-changed",
            SchedulerEvent::Paused => "paused",
            SchedulerEvent::Resumed => "resumed",
            SchedulerEvent::Clearing => "clearing",
            SchedulerEvent::Cleared => "cleared",
        }
    }
}

/// Publishes scheduler events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event.
    ///
    /// Returns `false` when nobody is subscribed.
    pub fn emit(&self, event: SchedulerEvent) -> bool {
        tracing::trace!(event = event.name(), "Scheduler event");
        // No receivers is not an error for the bus itself.
        self.tx.send(event).is_ok()
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    /// Subscribes as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<SchedulerEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Whether anyone is listening.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}
