//! Periodic re-scheduling tick.
//!
//! While a scheduler is running, a background task wakes every interval and
//! runs a scheduling pass. This catches states no other trigger would wake,
//! such as a grouped batch waiting on a flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to a running tick task. Stops the task when dropped.
#[derive(Debug)]
pub(crate) struct Ticker {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Starts calling `on_tick` every `interval`, skipping the immediate tick.
    ///
    /// The task ends on [`Ticker::stop`], on drop, or as soon as `on_tick`
    /// returns `false`.
    pub(crate) fn start<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await;

            loop {
                tick.tick().await;
                if flag.load(Ordering::Relaxed) || !on_tick() {
                    break;
                }
            }
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Signals the task to stop without waiting for it.
    pub(crate) fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        let ticker = Ticker::start(Duration::from_millis(10), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several ticks, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_callback_can_end_ticker() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        let _ticker = Ticker::start(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 1
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
