//! Worker contract and invocation.
//!
//! A [`Worker`] receives one [`Dispatch`] per invocation and reports back by
//! returning. Returning `Ok(())` resolves the unit; returning `Err` requeues
//! its tasks. A worker that panics instead of returning breaks the contract:
//! its unit is dropped and the scheduler raises a fatal error.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::task::Dispatch;

/// Processes dispatched tasks.
#[async_trait]
pub trait Worker<T: Send + 'static>: Send + Sync + 'static {
    /// Handles one dispatch unit.
    ///
    /// In ungrouped mode the dispatch is a single task; in grouped mode it is
    /// a batch mapping task ids to payloads.
    async fn run(&self, dispatch: Dispatch<T>) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`Worker`].
pub struct FnWorker<F> {
    f: F,
}

/// Wraps an async closure as a worker.
///
/// ```ignore
/// scheduler.set_worker(worker_fn(|dispatch: Dispatch<String>| async move {
///     println!("{:?}", dispatch.task_ids());
///     Ok(())
/// }));
/// ```
pub fn worker_fn<F>(f: F) -> FnWorker<F> {
    FnWorker { f }
}

#[async_trait]
impl<T, F, Fut> Worker<T> for FnWorker<F>
where
    T: Send + 'static,
    F: Fn(Dispatch<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, dispatch: Dispatch<T>) -> anyhow::Result<()> {
        (self.f)(dispatch).await
    }
}

/// How a worker invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The worker returned `Ok(())`.
    Success,
    /// The worker returned an error; the unit will be retried.
    Failed(String),
    /// The worker panicked or was torn down without returning.
    Faulted(String),
}

impl Outcome {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed(_) => "retry",
            Outcome::Faulted(_) => "fault",
        }
    }
}

/// Runs the worker on its own task and classifies the result.
///
/// The worker is always spawned rather than awaited inline so a panic is
/// contained to its task and surfaces here as [`Outcome::Faulted`].
pub(crate) async fn invoke<T: Send + 'static>(
    worker: Arc<dyn Worker<T>>,
    dispatch: Dispatch<T>,
) -> (Outcome, Duration) {
    let key = dispatch.key();
    let start = Instant::now();
    trace!(unit = %key, tasks = dispatch.len(), "Invoking worker");

    let handle = tokio::spawn(async move { worker.run(dispatch).await });
    let outcome = match handle.await {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(e)) => Outcome::Failed(format!("{:#}", e)),
        Err(e) if e.is_panic() => Outcome::Faulted(panic_message(e.into_panic())),
        Err(e) => Outcome::Faulted(e.to_string()),
    };

    let duration = start.elapsed();
    debug!(
        unit = %key,
        outcome = outcome.label(),
        duration_ms = duration.as_millis() as u64,
        "Worker returned"
    );
    (outcome, duration)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::{Task, TaskId};

    fn single(id: u64) -> Dispatch<u64> {
        Dispatch::Single(Task::new(TaskId(id), id))
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let worker: Arc<dyn Worker<u64>> =
            Arc::new(worker_fn(|_d: Dispatch<u64>| async { anyhow::Ok(()) }));

        let (outcome, _) = invoke(worker, single(1)).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(outcome.label(), "success");
    }

    #[tokio::test]
    async fn test_invoke_failure_keeps_context() {
        let worker: Arc<dyn Worker<u64>> = Arc::new(worker_fn(|d: Dispatch<u64>| async move {
            let id = d.task_ids()[0];
            Err::<(), _>(anyhow::anyhow!("disk full").context(format!("writing {}", id)))
        }));

        let (outcome, _) = invoke(worker, single(4)).await;
        match outcome {
            Outcome::Failed(message) => {
                assert!(message.contains("writing 4"));
                assert!(message.contains("disk full"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_panic_is_fault() {
        let worker: Arc<dyn Worker<u64>> = Arc::new(worker_fn(|_d: Dispatch<u64>| async move {
            if true {
                panic!("not-an-error-object");
            }
            anyhow::Ok(())
        }));

        let (outcome, _) = invoke(worker, single(0)).await;
        assert_eq!(outcome, Outcome::Faulted("not-an-error-object".to_string()));
        assert_eq!(outcome.label(), "fault");
    }

    struct CountingWorker {
        seen: std::sync::Mutex<Vec<TaskId>>,
    }

    #[async_trait]
    impl Worker<u64> for CountingWorker {
        async fn run(&self, dispatch: Dispatch<u64>) -> anyhow::Result<()> {
            self.seen
                .lock()
                .expect("lock not poisoned")
                .extend(dispatch.task_ids());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_impl_worker() {
        let worker = Arc::new(CountingWorker {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let dyn_worker: Arc<dyn Worker<u64>> = worker.clone();

        invoke(dyn_worker.clone(), single(2)).await;
        invoke(dyn_worker, single(3)).await;

        let seen = worker.seen.lock().expect("lock not poisoned").clone();
        assert_eq!(seen, vec![TaskId(2), TaskId(3)]);
    }
}
