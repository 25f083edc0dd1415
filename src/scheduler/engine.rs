//! The scheduler: bounded-concurrency dispatch with retry-to-front.
//!
//! A [`Scheduler`] owns a pending queue and an in-flight set behind one
//! mutex. Every mutation and every dispatch decision happens under that lock
//! and never across an `.await`; only the worker itself runs concurrently,
//! on its own tokio task.
//!
//! A scheduling pass runs after every submission, on resume, on every
//! completion, on flush and on the periodic tick while running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::metrics::MetricsCollector;

use super::config::{check_concurrency, check_group_size, SchedulerConfig};
use super::events::{EventBus, SchedulerEvent};
use super::queue::{InFlight, PendingQueue};
use super::stats::{Counters, SchedulerStats};
use super::task::{BatchId, Dispatch, Task, TaskId, UnitKey};
use super::ticker::Ticker;
use super::worker::{invoke, Outcome, Worker};

/// Status notice emitted when a pass finds no registered worker.
pub const NO_WORKER_NOTICE: &str = "There is no worker. Reverting to paused.";

/// In-process task scheduler.
///
/// Cloning is cheap and every clone drives the same queue. The scheduler
/// starts paused; call [`Scheduler::resume`] once a worker is registered.
///
/// All methods that may dispatch work must be called from within a tokio
/// runtime.
pub struct Scheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    name: String,
    tick_interval: Duration,
    state: Mutex<State<T>>,
    events: EventBus,
    counters: Counters,
    metrics: MetricsCollector,
}

struct State<T> {
    worker: Option<Arc<dyn Worker<T>>>,
    pending: PendingQueue<T>,
    in_flight: InFlight<T>,
    concurrency: usize,
    grouping_enabled: bool,
    group_size: usize,
    paused: bool,
    flushing: bool,
    fault: Option<SchedulerError>,
    next_task_id: u64,
    next_batch_id: u64,
    ticker: Option<Ticker>,
}

impl<T> State<T> {
    /// Units a pass could start if capacity were unlimited.
    fn dispatchable_units(&self) -> usize {
        let pending = self.pending.len();
        if !self.grouping_enabled {
            return pending;
        }
        let full = pending / self.group_size;
        if self.flushing && pending % self.group_size != 0 {
            full + 1
        } else {
            full
        }
    }
}

type Started<T> = (Arc<dyn Worker<T>>, Dispatch<T>);

impl<T: Clone + Send + 'static> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Scheduler<T> {
    /// Creates a paused scheduler with default configuration.
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default())
    }

    /// Creates a paused scheduler from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Config` if the configuration does not validate.
    pub fn from_config(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SchedulerConfig) -> Self {
        let state = State {
            worker: None,
            pending: PendingQueue::new(),
            in_flight: InFlight::new(),
            concurrency: config.concurrency,
            grouping_enabled: config.grouping_enabled,
            group_size: config.group_size,
            paused: true,
            flushing: false,
            fault: None,
            next_task_id: 0,
            next_batch_id: 0,
            ticker: None,
        };

        debug!(
            scheduler = %config.name,
            concurrency = config.concurrency,
            grouping = config.grouping_enabled,
            group_size = config.group_size,
            "Scheduler created"
        );

        Self {
            inner: Arc::new(Inner {
                metrics: MetricsCollector::new(config.name.clone()),
                name: config.name,
                tick_interval: config.tick_interval,
                state: Mutex::new(state),
                events: EventBus::new(config.event_capacity),
                counters: Counters::default(),
            }),
        }
    }

    // Configuration

    /// Registers the worker, replacing any previous one.
    pub fn set_worker<W: Worker<T>>(&self, worker: W) {
        let mut state = self.inner.lock();
        let replaced = state.worker.replace(Arc::new(worker)).is_some();
        self.inner.events.emit(SchedulerEvent::WorkerRegistered);
        info!(scheduler = %self.inner.name, replaced, "Worker registered");
    }

    /// Sets the maximum number of in-flight dispatch units.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConcurrency` for negative values; the limit is left
    /// unchanged and the error is also emitted as an event. The error is only
    /// returned, never escalated, even when nobody is subscribed.
    pub fn set_concurrency(&self, concurrency: i64) -> SchedulerResult<()> {
        let concurrency = check_concurrency(concurrency).map_err(|e| self.inner.report(e))?;

        let mut state = self.inner.lock();
        state.concurrency = concurrency;
        self.inner
            .events
            .emit(SchedulerEvent::ConcurrencyChanged(concurrency));
        info!(scheduler = %self.inner.name, concurrency, "Concurrency changed");
        Ok(())
    }

    /// Sets how many tasks are bundled per batch in grouped mode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupSize` unless the value is at least 1. As with
    /// [`Scheduler::set_concurrency`], the error is emitted and returned but
    /// never escalated.
    pub fn set_group_size(&self, group_size: i64) -> SchedulerResult<()> {
        let group_size = check_group_size(group_size).map_err(|e| self.inner.report(e))?;

        let mut state = self.inner.lock();
        state.group_size = group_size;
        self.inner
            .events
            .emit(SchedulerEvent::GroupSizeChanged(group_size));
        info!(scheduler = %self.inner.name, group_size, "Group size changed");
        Ok(())
    }

    /// Switches between single-task and batched dispatch.
    pub fn set_grouping_enabled(&self, enabled: bool) {
        let mut state = self.inner.lock();
        state.grouping_enabled = enabled;
        self.inner
            .events
            .emit(SchedulerEvent::GroupingChanged(enabled));
        info!(scheduler = %self.inner.name, enabled, "Grouping changed");
    }

    // Submission

    /// Queues a payload and returns its id. Dispatch happens asynchronously.
    pub fn submit(&self, payload: T) -> TaskId {
        let id = {
            let mut state = self.inner.lock();
            let id = state.allocate_id();
            state.pending.enqueue(Task::new(id, payload));
            self.inner.record_gauges(&state);
            id
        };
        self.inner.counters.record_submitted(1);
        self.inner.metrics.record_submitted(1);
        trace!(scheduler = %self.inner.name, task_id = %id, "Task submitted");

        self.inner.schedule();
        id
    }

    /// Queues several payloads in order and runs a single scheduling pass.
    pub fn submit_all<I>(&self, payloads: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = T>,
    {
        let ids = {
            let mut state = self.inner.lock();
            let ids: Vec<TaskId> = payloads
                .into_iter()
                .map(|payload| {
                    let id = state.allocate_id();
                    state.pending.enqueue(Task::new(id, payload));
                    id
                })
                .collect();
            self.inner.record_gauges(&state);
            ids
        };
        self.inner.counters.record_submitted(ids.len() as u64);
        self.inner.metrics.record_submitted(ids.len());
        debug!(scheduler = %self.inner.name, count = ids.len(), "Tasks submitted");

        self.inner.schedule();
        ids
    }

    // Lifecycle

    /// Stops starting new dispatches. In-flight units run to completion.
    pub fn pause(&self) {
        let mut state = self.inner.lock();
        self.inner.pause_locked(&mut state);
    }

    /// Starts dispatching and arms the periodic re-scheduling tick.
    ///
    /// # Errors
    ///
    /// Returns the `NonErrorFailure` that paused the scheduler when no
    /// subscriber was listening. The scheduler stays paused; the fault is
    /// reported once and the next call resumes.
    pub fn resume(&self) -> SchedulerResult<()> {
        {
            let mut state = self.inner.lock();
            if let Some(err) = state.fault.take() {
                warn!(
                    scheduler = %self.inner.name,
                    error = %err,
                    "Resume refused after unobserved worker fault"
                );
                return Err(err);
            }
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
            self.inner.events.emit(SchedulerEvent::Resumed);
            state.ticker = Some(self.inner.start_ticker());
            info!(scheduler = %self.inner.name, "Scheduler resumed");
        }
        self.inner.schedule();
        Ok(())
    }

    /// Drops every pending task. In-flight units are unaffected.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        self.inner.events.emit(SchedulerEvent::Clearing);
        let removed = state.pending.clear();
        self.inner.events.emit(SchedulerEvent::Cleared);
        self.inner.record_gauges(&state);
        info!(scheduler = %self.inner.name, removed, "Pending queue cleared");
    }

    /// Lets the next grouped pass dispatch an undersized batch.
    ///
    /// The request stays armed until a partial batch actually goes out: a
    /// flush on an empty queue, or with only full groups pending, lets the
    /// next lone submission dispatch without waiting for a full group.
    pub fn flush(&self) {
        {
            let mut state = self.inner.lock();
            state.flushing = true;
            debug!(
                scheduler = %self.inner.name,
                pending = state.pending.len(),
                "Flush requested"
            );
        }
        self.inner.schedule();
    }

    /// Runs a scheduling pass now.
    pub fn schedule(&self) {
        self.inner.schedule();
    }

    // Events

    /// Subscribes to scheduler events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Subscribes to scheduler events as a `Stream`.
    pub fn event_stream(&self) -> tokio_stream::wrappers::BroadcastStream<SchedulerEvent> {
        self.inner.events.stream()
    }

    // Introspection

    /// The unobserved worker fault waiting to be returned by `resume`, if any.
    pub fn fault(&self) -> Option<SchedulerError> {
        self.inner.lock().fault.clone()
    }

    /// Name used in logs and metric labels.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn has_worker(&self) -> bool {
        self.inner.lock().worker.is_some()
    }

    pub fn concurrency(&self) -> usize {
        self.inner.lock().concurrency
    }

    pub fn group_size(&self) -> usize {
        self.inner.lock().group_size
    }

    pub fn is_grouping_enabled(&self) -> bool {
        self.inner.lock().grouping_enabled
    }

    /// Whether a flush is still waiting for a partial batch.
    pub fn is_flushing(&self) -> bool {
        self.inner.lock().flushing
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Ids of the pending tasks, front first.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.inner.lock().pending.ids()
    }

    pub fn in_flight_units(&self) -> usize {
        self.inner.lock().in_flight.units()
    }

    pub fn in_flight_tasks(&self) -> usize {
        self.inner.lock().in_flight.tasks()
    }

    /// Returns a snapshot of queue state and counters.
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = {
            let state = self.inner.lock();
            SchedulerStats {
                pending: state.pending.len(),
                in_flight_units: state.in_flight.units(),
                in_flight_tasks: state.in_flight.tasks(),
                concurrency: state.concurrency,
                paused: state.paused,
                ..Default::default()
            }
        };
        self.inner.counters.fill(&mut stats);
        stats
    }
}

impl<T> State<T> {
    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        id
    }
}

impl<T: Clone + Send + 'static> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one scheduling pass and spawns whatever it started.
    fn schedule(self: &Arc<Self>) {
        let started = {
            let mut state = self.lock();
            let capacity = state
                .concurrency
                .saturating_sub(state.in_flight.units());
            let to_start = state.dispatchable_units().min(capacity);

            // One attempt more than computed. The last one is a no-op unless
            // it finds no worker, in which case it pauses the scheduler.
            let mut started = Vec::new();
            for _ in 0..=to_start {
                if let Some(unit) = self.attempt_dispatch(&mut state) {
                    started.push(unit);
                }
            }

            if !started.is_empty() {
                debug!(
                    scheduler = %self.name,
                    started = started.len(),
                    capacity,
                    pending = state.pending.len(),
                    in_flight = state.in_flight.units(),
                    "Scheduling pass"
                );
                self.record_gauges(&state);
            }
            started
        };

        for (worker, dispatch) in started {
            self.spawn_dispatch(worker, dispatch);
        }
    }

    /// One dispatch attempt. Returns the unit to hand to the worker, if any.
    fn attempt_dispatch(&self, state: &mut State<T>) -> Option<Started<T>> {
        if state.paused {
            return None;
        }

        let Some(worker) = state.worker.clone() else {
            self.events
                .emit(SchedulerEvent::Status(NO_WORKER_NOTICE.to_string()));
            warn!(scheduler = %self.name, "No worker registered, pausing");
            self.pause_locked(state);
            return None;
        };

        if state.in_flight.units() >= state.concurrency {
            return None;
        }

        if !state.grouping_enabled {
            let task = state.pending.dequeue()?;
            trace!(
                scheduler = %self.name,
                task_id = %task.id,
                attempt = task.attempts + 1,
                "Dispatching task"
            );
            return Some((worker, state.in_flight.start_single(task)));
        }

        if !state.flushing && state.pending.len() < state.group_size {
            return None;
        }

        let tasks = state.pending.dequeue_batch(state.group_size);
        if tasks.is_empty() {
            return None;
        }
        if tasks.len() < state.group_size {
            state.flushing = false;
        }

        let id = BatchId(state.next_batch_id);
        state.next_batch_id += 1;
        trace!(
            scheduler = %self.name,
            batch_id = %id,
            tasks = tasks.len(),
            "Dispatching batch"
        );
        Some((worker, state.in_flight.start_batch(id, tasks)))
    }

    fn spawn_dispatch(self: &Arc<Self>, worker: Arc<dyn Worker<T>>, dispatch: Dispatch<T>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let key = dispatch.key();
            let (outcome, duration) = invoke(worker, dispatch).await;
            inner.complete(key, outcome, duration);
        });
    }

    /// Resolves an in-flight unit and runs the follow-up pass.
    fn complete(self: &Arc<Self>, key: UnitKey, outcome: Outcome, duration: Duration) {
        {
            let mut state = self.lock();
            let Some(tasks) = state.in_flight.complete(key) else {
                warn!(scheduler = %self.name, unit = %key, "Completion for unknown unit");
                return;
            };

            match &outcome {
                Outcome::Success => {
                    self.counters.record_completion(duration);
                    self.events.emit(SchedulerEvent::TaskComplete(key));
                }
                Outcome::Failed(message) => {
                    self.counters.record_failure(duration);
                    let err = SchedulerError::WorkerFailure {
                        unit: key,
                        message: message.clone(),
                    };
                    warn!(
                        scheduler = %self.name,
                        tasks = tasks.len(),
                        attempt = tasks.first().map(|t| t.attempts).unwrap_or_default(),
                        error = %err,
                        "Returning tasks to front of queue"
                    );
                    state.pending.requeue(tasks);
                    self.events.emit(SchedulerEvent::Status(format!(
                        "Worker failed. Returning task to front of queue. Error message: {}",
                        message
                    )));
                    self.events.emit(SchedulerEvent::TaskComplete(key));
                }
                Outcome::Faulted(message) => {
                    self.counters.record_fault(duration);
                    self.raise_locked(
                        &mut state,
                        SchedulerError::NonErrorFailure {
                            unit: key,
                            message: message.clone(),
                        },
                    );
                }
            }

            self.record_gauges(&state);
        }

        let mode = match key {
            UnitKey::Task(_) => "single",
            UnitKey::Batch(_) => "batch",
        };
        self.metrics.record_dispatch(outcome.label(), mode, duration);

        self.schedule();
    }

    fn pause_locked(&self, state: &mut State<T>) {
        if state.paused {
            return;
        }
        state.paused = true;
        if let Some(ticker) = state.ticker.take() {
            ticker.stop();
        }
        self.events.emit(SchedulerEvent::Paused);
        info!(
            scheduler = %self.name,
            pending = state.pending.len(),
            in_flight = state.in_flight.units(),
            "Scheduler paused"
        );
    }

    fn start_ticker(self: &Arc<Self>) -> Ticker {
        let weak = Arc::downgrade(self);
        Ticker::start(self.tick_interval, move || match weak.upgrade() {
            Some(inner) => {
                inner.schedule();
                true
            }
            None => false,
        })
    }

    /// Emits a recoverable error and hands it back for the caller.
    fn report(&self, err: SchedulerError) -> SchedulerError {
        warn!(scheduler = %self.name, error = %err, "Rejected configuration value");
        self.events.emit(SchedulerEvent::Error(err.clone()));
        err
    }

    /// Emits a fatal error. If nobody is listening, pauses the scheduler and
    /// holds the error for the next [`Scheduler::resume`].
    fn raise_locked(&self, state: &mut State<T>, err: SchedulerError) {
        error!(scheduler = %self.name, error = %err, "Worker broke its contract");
        let delivered = self.events.emit(SchedulerEvent::Error(err.clone()));
        if delivered || !err.is_fatal() {
            return;
        }
        self.pause_locked(state);
        state.fault = Some(err);
    }

    fn record_gauges(&self, state: &State<T>) {
        self.metrics.update_queue_depth(state.pending.len());
        self.metrics.update_in_flight(state.in_flight.units());
    }
}
