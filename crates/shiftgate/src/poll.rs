//! Scheduled re-fetching bound to a scope.
//!
//! A [`PollScope`] runs a fetch immediately and then once per period,
//! delivering each outcome over a channel. Stopping or dropping the scope
//! cancels the timer and any fetch still in flight; an outcome that completes
//! after that point is discarded.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Outcomes buffered before the poller waits for the consumer.
const CHANNEL_CAPACITY: usize = 4;

/// Shortest accepted period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A running poller. Dropping it cancels the poller.
pub struct PollScope<T> {
    updates: mpsc::Receiver<T>,
    handle: PollHandle,
    task: JoinHandle<()>,
    period: Duration,
}

impl<T> fmt::Debug for PollScope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScope")
            .field("period", &self.period)
            .field("stopped", &self.handle.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PollScope<T> {
    /// Start polling with `fetch` every `period`.
    ///
    /// The first fetch runs immediately. If a fetch takes longer than the
    /// period, the next one starts a full period after it finished.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let (tx, updates) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let task = tokio::spawn(async move {
            debug!(period_ms = period.as_millis(), "Starting poller");
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }

                trace!("Poll tick");
                let outcome = tokio::select! {
                    _ = shutdown.changed() => break,
                    outcome = fetch() => outcome,
                };

                // A stop that raced the fetch wins
                if *shutdown.borrow() {
                    break;
                }
                if tx.send(outcome).await.is_err() {
                    debug!("Poll receiver closed, stopping poller");
                    break;
                }
            }
            debug!("Poller stopped");
        });

        Self {
            updates,
            handle: PollHandle {
                shutdown: Arc::new(shutdown_tx),
            },
            task,
            period,
        }
    }
}

impl<T> PollScope<T> {
    /// Wait for the next outcome. Returns `None` once the scope is stopped.
    pub async fn next(&mut self) -> Option<T> {
        if self.handle.is_stopped() {
            return None;
        }
        let outcome = self.updates.recv().await?;
        // Outcomes buffered before a remote stop are dropped too
        if self.handle.is_stopped() {
            return None;
        }
        Some(outcome)
    }

    /// Stop polling. Any fetch in flight is abandoned.
    pub fn stop(&mut self) {
        self.handle.stop();
        self.updates.close();
        self.task.abort();
    }

    /// A handle that can stop this scope from another task.
    #[must_use]
    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }

    /// The polling period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Check whether the polling task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PollScope<T> {
    fn drop(&mut self) {
        self.handle.stop();
        self.task.abort();
    }
}

/// Stops a [`PollScope`] from elsewhere.
#[derive(Debug, Clone)]
pub struct PollHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl PollHandle {
    /// Signal the poller to stop.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Check if a stop has been signalled.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<usize> {
        let counter = Arc::clone(counter);
        move || std::future::ready(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test]
    async fn test_first_fetch_is_immediate() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scope = PollScope::spawn(Duration::from_secs(3600), counting(&counter));

        let first = tokio::time::timeout(Duration::from_secs(1), scope.next())
            .await
            .unwrap();
        assert_eq!(first, Some(1));
    }

    #[tokio::test]
    async fn test_delivers_repeatedly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scope = PollScope::spawn(Duration::from_millis(10), counting(&counter));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(scope.next().await.unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stop_ends_delivery() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scope = PollScope::spawn(Duration::from_millis(10), counting(&counter));
        assert!(scope.next().await.is_some());

        scope.stop();
        assert_eq!(scope.next().await, None);
    }

    #[tokio::test]
    async fn test_remote_stop_via_handle() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scope = PollScope::spawn(Duration::from_millis(10), counting(&counter));
        let handle = scope.handle();

        assert!(scope.next().await.is_some());
        handle.stop();
        assert!(handle.is_stopped());
        assert_eq!(scope.next().await, None);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(scope.is_finished());
    }

    #[tokio::test]
    async fn test_drop_cancels_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scope = PollScope::spawn(Duration::from_millis(5), counting(&counter));
        assert!(scope.next().await.is_some());
        drop(scope);

        let after_drop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_late_response_is_discarded() {
        let completed = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&completed);
        let mut scope = PollScope::spawn(Duration::from_secs(3600), move || {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                done.fetch_add(1, Ordering::SeqCst);
                "late"
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.stop();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(scope.next().await, None);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_period_is_clamped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scope = PollScope::spawn(Duration::ZERO, counting(&counter));
        assert_eq!(scope.period(), MIN_PERIOD);
    }

    #[tokio::test]
    async fn test_debug_output() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scope = PollScope::spawn(Duration::from_secs(1), counting(&counter));
        let debug_str = format!("{scope:?}");
        assert!(debug_str.contains("PollScope"));
        assert!(debug_str.contains("stopped: false"));
    }
}
