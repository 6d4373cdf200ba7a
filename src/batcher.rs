//! Public batcher handle.

use crate::metrics::{BatcherMetrics, StatsRecorder};
use crate::runtime::{Envelope, Lifecycle, LifecycleState, Worker, WorkerLinks};
use crate::utils::HealthStatus;
use crate::{flush_fn, BatchError, BatchResult, BatcherConfig, BatcherStats, FlushHandler};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Accumulates items from any number of producers and flushes them, in
/// order, when the pending group reaches capacity or the group's timeout
/// elapses, whichever comes first.
///
/// Submission is a blocking hand-off with backpressure: `push`/`add` return
/// once the worker has appended the item to its pending group, or with
/// [`BatchError::Closed`] once shutdown has begun. An accepted item is
/// flushed exactly once; a rejected item is dropped and never flushed.
///
/// Share a batcher between tasks with `Arc<Batcher<T>>`. Dropping the last
/// handle without calling [`close`](Batcher::close) still shuts the worker
/// down and flushes the pending group in the background.
pub struct Batcher<T: Send + 'static> {
    name: String,
    capacity: usize,
    timeout: Duration,
    unhealthy_after: usize,
    inbox: mpsc::Sender<Envelope<T>>,
    shutdown: CancellationToken,
    lifecycle: Lifecycle,
    stats: Arc<StatsRecorder>,
    metrics: BatcherMetrics,
    worker: Mutex<Option<JoinHandle<BatchResult<()>>>>,
}

impl<T: Send + 'static> Batcher<T> {
    /// Create a batcher that passes every flushed group to `on_flush`
    ///
    /// A zero `timeout` disables time-triggered flushes. Fails with
    /// `InvalidConfiguration` if `capacity` is 0, and with `Runtime` when
    /// called outside a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use batcher_core::Batcher;
    /// use std::time::Duration;
    ///
    /// # async fn run() -> batcher_core::BatchResult<()> {
    /// let batcher = Batcher::new(100, Duration::from_millis(50), |batch: Vec<u64>| {
    ///     println!("writing {} rows", batch.len());
    /// })?;
    ///
    /// batcher.add(0..250).await?;
    /// batcher.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<F>(capacity: usize, timeout: Duration, on_flush: F) -> BatchResult<Self>
    where
        F: FnMut(Vec<T>) + Send + 'static,
    {
        Self::with_handler(BatcherConfig::new(capacity, timeout), flush_fn(on_flush))
    }

    /// Create a batcher from a full configuration and a [`FlushHandler`]
    pub fn with_handler<H>(config: BatcherConfig, handler: H) -> BatchResult<Self>
    where
        H: FlushHandler<T>,
    {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            BatchError::runtime(format!("a batcher must be created inside a Tokio runtime: {}", e))
        })?;

        // A single slot plus a per-item acknowledgement makes the hand-off a
        // rendezvous: producers wait until the worker has taken the item.
        let (inbox, receiver) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let lifecycle = Lifecycle::new();
        let stats = Arc::new(StatsRecorder::default());
        let metrics = BatcherMetrics::new(&config.name);

        let links = WorkerLinks {
            inbox: receiver,
            shutdown: shutdown.clone(),
            lifecycle: lifecycle.clone(),
            stats: stats.clone(),
            metrics: metrics.clone(),
        };
        let worker = runtime.spawn(Worker::new(&config, handler, links).run());

        info!(
            batcher = %config.name,
            capacity = config.capacity,
            timeout = ?config.timeout(),
            policy = ?config.failure_policy,
            "batcher started"
        );

        Ok(Self {
            name: config.name.clone(),
            capacity: config.capacity,
            timeout: config.timeout(),
            unhealthy_after: config.unhealthy_after,
            inbox,
            shutdown,
            lifecycle,
            stats,
            metrics,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Submit one item
    ///
    /// Waits while the worker is busy (e.g. inside a slow flush). Returns
    /// `Err(BatchError::Closed { accepted: 0 })` if shutdown began first.
    pub async fn push(&self, item: T) -> BatchResult<()> {
        if self.hand_off(item).await {
            Ok(())
        } else {
            self.reject(1);
            Err(BatchError::closed(0))
        }
    }

    /// Submit items one at a time, in iteration order
    ///
    /// Returns `Ok(n)` when all `n` items were accepted. If shutdown
    /// intervenes, returns `Err(BatchError::Closed { accepted })`: the first
    /// `accepted` items will be flushed, the rest were dropped.
    pub async fn add<I>(&self, items: I) -> BatchResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = items.into_iter();
        let mut accepted = 0;

        while let Some(item) = items.next() {
            if !self.hand_off(item).await {
                self.reject(1 + items.count());
                return Err(BatchError::closed(accepted));
            }
            accepted += 1;
        }

        Ok(accepted)
    }

    /// Request shutdown and wait for the worker to stop
    ///
    /// The pending group, if non-empty, is flushed once more before the
    /// worker exits. Calling `close` again, or concurrently, waits for the
    /// same termination and then returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - `CallbackFailure` if the worker stopped because of a handler failure
    ///   under `FailurePolicy::Terminate`, or the handler's shutdown hook failed
    /// - `Runtime` if the worker task itself was aborted
    pub async fn close(&self) -> BatchResult<()> {
        if self.lifecycle.begin_closing() {
            info!(batcher = %self.name, "shutting down batcher");
        }
        self.shutdown.cancel();

        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.as_mut() else {
            return Ok(());
        };

        let outcome = handle.await;
        *worker = None;
        self.lifecycle.terminate();

        match outcome {
            Ok(result) => result,
            Err(join_error) => Err(BatchError::from(join_error)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check if shutdown has begun (the batcher no longer accepts items)
    pub fn is_closed(&self) -> bool {
        self.state() != LifecycleState::Open
    }

    /// Snapshot of the batcher's counters
    pub fn stats(&self) -> BatcherStats {
        self.stats.snapshot()
    }

    /// Health derived from consecutive flush failures
    pub fn health(&self) -> HealthStatus {
        HealthStatus::from_failures(self.stats.consecutive_failures(), self.unhealthy_after)
    }

    /// Name used in logs and metrics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum group size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Group timeout (`Duration::ZERO` when time-triggered flushes are disabled)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Hand one item to the worker; true once the worker has accepted it
    async fn hand_off(&self, item: T) -> bool {
        let permit = tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => return false,
            permit = self.inbox.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let (accepted, ack) = oneshot::channel();
        permit.send(Envelope { item, accepted });

        // The worker either acknowledges the item or drops it on shutdown.
        ack.await.is_ok()
    }

    fn reject(&self, count: usize) {
        debug!(batcher = %self.name, count, "items rejected, batcher is shutting down");
        self.stats.record_rejected(count);
        self.metrics.record_rejected(count);
    }
}

impl<T: Send + 'static> Drop for Batcher<T> {
    fn drop(&mut self) {
        if self.lifecycle.begin_closing() {
            debug!(batcher = %self.name, "batcher dropped without close, shutting down");
        }
        self.shutdown.cancel();
    }
}

impl<T: Send + 'static> fmt::Debug for Batcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_zero_capacity_is_rejected() {
        let err = Batcher::new(0, Duration::ZERO, |_batch: Vec<u8>| {}).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_requires_tokio_runtime() {
        let err = Batcher::new(4, Duration::ZERO, |_batch: Vec<u8>| {}).unwrap_err();
        assert!(matches!(err, BatchError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let batcher = Batcher::new(4, Duration::ZERO, |_batch: Vec<u8>| {}).unwrap();
        assert_eq!(batcher.state(), LifecycleState::Open);
        assert!(!batcher.is_closed());
        assert_eq!(batcher.capacity(), 4);
        assert_eq!(batcher.timeout(), Duration::ZERO);
        assert_eq!(batcher.name(), "batcher");

        batcher.close().await.unwrap();
        assert_eq!(batcher.state(), LifecycleState::Terminated);
        assert!(batcher.is_closed());
    }

    #[tokio::test]
    async fn test_push_after_close_is_rejected() {
        let flushed = Arc::new(StdMutex::new(Vec::new()));
        let sink = flushed.clone();
        let batcher = Batcher::new(4, Duration::ZERO, move |batch: Vec<u8>| {
            sink.lock().unwrap().push(batch)
        })
        .unwrap();

        batcher.push(1).await.unwrap();
        batcher.close().await.unwrap();

        let err = batcher.push(2).await.unwrap_err();
        assert_eq!(err.accepted(), Some(0));

        let err = batcher.add(vec![3, 4, 5]).await.unwrap_err();
        assert_eq!(err.accepted(), Some(0));

        assert_eq!(*flushed.lock().unwrap(), vec![vec![1]]);
        let stats = batcher.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 4);
    }

    #[tokio::test]
    async fn test_drop_flushes_in_background() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let batcher = Batcher::new(10, Duration::ZERO, move |batch: Vec<u8>| {
            let _ = tx.send(batch);
        })
        .unwrap();

        batcher.add(vec![1, 2]).await.unwrap();
        drop(batcher);

        let flushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(flushed, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_debug_output() {
        let batcher = Batcher::new(2, Duration::from_millis(5), |_batch: Vec<u8>| {}).unwrap();
        let rendered = format!("{:?}", batcher);
        assert!(rendered.contains("capacity: 2"));
        assert!(rendered.contains("Open"));
        batcher.close().await.unwrap();
    }
}
