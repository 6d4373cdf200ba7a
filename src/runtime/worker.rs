//! Batcher worker: the single owner of the pending group and its timer.
//!
//! The worker waits on three events at once (shutdown, group deadline, next
//! item) and serializes every state transition, so neither the group nor the
//! deadline needs a lock. Flushes run inline on the worker, which is what
//! makes them strictly sequential and what pushes back on producers while a
//! slow handler is running.

use crate::metrics::{BatcherMetrics, FlushTimer, StatsRecorder};
use crate::runtime::Lifecycle;
use crate::utils::{FlushTrigger, HealthStatus, PendingGroup};
use crate::{BatchError, BatchResult, BatcherConfig, FailurePolicy, FlushHandler};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// An item handed off by a producer
///
/// `accepted` is completed once the item is in the pending group. If the
/// envelope is dropped instead (shutdown), the producer sees a rejection.
pub(crate) struct Envelope<T> {
    pub(crate) item: T,
    pub(crate) accepted: oneshot::Sender<()>,
}

/// Channels and shared cells connecting a worker to its handle
pub(crate) struct WorkerLinks<T> {
    pub(crate) inbox: mpsc::Receiver<Envelope<T>>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) stats: Arc<StatsRecorder>,
    pub(crate) metrics: BatcherMetrics,
}

pub(crate) struct Worker<T, H> {
    name: String,
    group: PendingGroup<T>,
    handler: H,
    policy: FailurePolicy,
    unhealthy_after: usize,
    inbox: mpsc::Receiver<Envelope<T>>,
    shutdown: CancellationToken,
    lifecycle: Lifecycle,
    metrics: BatcherMetrics,
    stats: Arc<StatsRecorder>,
}

impl<T, H> Worker<T, H>
where
    T: Send + 'static,
    H: FlushHandler<T>,
{
    pub(crate) fn new(config: &BatcherConfig, handler: H, links: WorkerLinks<T>) -> Self {
        Self {
            name: config.name.clone(),
            group: PendingGroup::new(config.capacity, config.timeout()),
            handler,
            policy: config.failure_policy,
            unhealthy_after: config.unhealthy_after,
            inbox: links.inbox,
            shutdown: links.shutdown,
            lifecycle: links.lifecycle,
            metrics: links.metrics,
            stats: links.stats,
        }
    }

    /// Run until shutdown (or a fatal handler failure), then terminate
    pub(crate) async fn run(mut self) -> BatchResult<()> {
        debug!(batcher = %self.name, "batcher worker started");
        self.metrics.set_health(HealthStatus::Healthy);

        let outcome = self.process_items().await;

        // Anything still in the hand-off slot is rejected when the inbox drops.
        self.inbox.close();
        self.lifecycle.begin_closing();
        self.shutdown.cancel();

        let hook = guarded("shutdown hook", self.handler.shutdown()).await;
        self.lifecycle.terminate();
        self.metrics.set_pending(0);

        info!(batcher = %self.name, "batcher worker stopped");
        outcome.and(hook)
    }

    async fn process_items(&mut self) -> BatchResult<()> {
        loop {
            let deadline = self.group.deadline();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(batcher = %self.name, pending = self.group.len(), "shutdown requested");
                    self.inbox.close();
                    return self.flush_pending(FlushTrigger::Shutdown).await;
                }

                _ = expire(deadline) => {
                    self.flush_pending(FlushTrigger::Timeout).await?;
                }

                received = self.inbox.recv() => match received {
                    Some(envelope) => self.accept(envelope).await?,
                    // every sender is gone
                    None => return self.flush_pending(FlushTrigger::Shutdown).await,
                },
            }
        }
    }

    async fn accept(&mut self, envelope: Envelope<T>) -> BatchResult<()> {
        let Envelope { item, accepted } = envelope;

        self.stats.record_accepted();
        self.metrics.record_accepted();
        // The producer may have stopped waiting; the item is taken either way.
        let _ = accepted.send(());

        match self.group.push(item, Instant::now()) {
            Some(batch) => self.dispatch(batch, FlushTrigger::Size).await,
            None => {
                self.metrics.set_pending(self.group.len());
                Ok(())
            }
        }
    }

    async fn flush_pending(&mut self, trigger: FlushTrigger) -> BatchResult<()> {
        if self.group.is_empty() {
            return Ok(());
        }
        let batch = self.group.take();
        self.dispatch(batch, trigger).await
    }

    async fn dispatch(&mut self, batch: Vec<T>, trigger: FlushTrigger) -> BatchResult<()> {
        let size = batch.len();
        debug!(batcher = %self.name, %trigger, size, "flushing batch");

        self.metrics.set_pending(0);
        self.metrics.record_flush(trigger, size);
        self.stats.record_flush(trigger);

        let timer = FlushTimer::start(&self.metrics, trigger);
        let result = guarded("flush handler", self.handler.flush(batch)).await;
        timer.stop();

        let err = match result {
            Ok(()) => {
                self.stats.record_success();
                self.metrics.set_health(HealthStatus::Healthy);
                return Ok(());
            }
            Err(err) => err,
        };

        let streak = self.stats.record_failure();
        self.metrics.record_failure(trigger);
        self.metrics
            .set_health(HealthStatus::from_failures(streak, self.unhealthy_after));

        match self.policy {
            FailurePolicy::Isolate => {
                error!(
                    batcher = %self.name,
                    %trigger,
                    size,
                    consecutive_failures = streak,
                    "flush failed, batch dropped: {}",
                    err
                );
                Ok(())
            }
            FailurePolicy::Terminate => {
                error!(
                    batcher = %self.name,
                    %trigger,
                    size,
                    "flush failed, stopping batcher: {}",
                    err
                );
                Err(err)
            }
        }
    }
}

/// Resolve when the group deadline passes; never resolves while disarmed
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Await a handler future, turning a panic into a `CallbackFailure`
async fn guarded<F>(what: &str, fut: F) -> BatchResult<()>
where
    F: Future<Output = BatchResult<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(BatchError::callback(format!(
            "{} panicked: {}",
            what,
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
