//! Metrics and observability for batchers.

use crate::utils::{FlushTrigger, HealthStatus};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics collector for a batcher, recorded through the `metrics` facade
#[derive(Debug, Clone)]
pub struct BatcherMetrics {
    /// Batcher name for labeling
    batcher: String,
}

impl BatcherMetrics {
    /// Create a new metrics collector
    pub fn new(batcher: impl Into<String>) -> Self {
        Self::register_metrics();

        Self {
            batcher: batcher.into(),
        }
    }

    /// Register metric descriptions
    fn register_metrics() {
        // Counters
        describe_counter!(
            "batcher_items_accepted_total",
            "Total number of items accepted into a pending group"
        );
        describe_counter!(
            "batcher_items_rejected_total",
            "Total number of items dropped because shutdown had begun"
        );
        describe_counter!(
            "batcher_flushes_total",
            "Total number of flush handler invocations"
        );
        describe_counter!(
            "batcher_flush_failures_total",
            "Total number of flush handler invocations that failed or panicked"
        );

        // Histograms
        describe_histogram!("batcher_batch_size", "Number of items in each flushed group");
        describe_histogram!(
            "batcher_flush_duration_seconds",
            "Time spent in the flush handler"
        );

        // Gauges
        describe_gauge!(
            "batcher_pending_items",
            "Current number of items in the pending group"
        );
        describe_gauge!(
            "batcher_health",
            "Batcher health (1 = healthy, 0.5 = degraded, 0 = unhealthy)"
        );
    }

    /// Record an accepted item
    pub fn record_accepted(&self) {
        counter!("batcher_items_accepted_total", "batcher" => self.batcher.clone()).increment(1);
    }

    /// Record items dropped on shutdown
    pub fn record_rejected(&self, count: usize) {
        counter!("batcher_items_rejected_total", "batcher" => self.batcher.clone())
            .increment(count as u64);
    }

    /// Record a flush and the size of its group
    pub fn record_flush(&self, trigger: FlushTrigger, size: usize) {
        counter!(
            "batcher_flushes_total",
            "batcher" => self.batcher.clone(),
            "trigger" => trigger.as_str(),
        )
        .increment(1);

        histogram!(
            "batcher_batch_size",
            "batcher" => self.batcher.clone(),
            "trigger" => trigger.as_str(),
        )
        .record(size as f64);
    }

    /// Record a failed flush
    pub fn record_failure(&self, trigger: FlushTrigger) {
        counter!(
            "batcher_flush_failures_total",
            "batcher" => self.batcher.clone(),
            "trigger" => trigger.as_str(),
        )
        .increment(1);
    }

    /// Record flush handler duration
    pub fn record_flush_duration(&self, trigger: FlushTrigger, duration: Duration) {
        histogram!(
            "batcher_flush_duration_seconds",
            "batcher" => self.batcher.clone(),
            "trigger" => trigger.as_str(),
        )
        .record(duration.as_secs_f64());
    }

    /// Set the pending group size
    pub fn set_pending(&self, count: usize) {
        gauge!("batcher_pending_items", "batcher" => self.batcher.clone()).set(count as f64);
    }

    /// Set batcher health status
    pub fn set_health(&self, status: HealthStatus) {
        gauge!("batcher_health", "batcher" => self.batcher.clone()).set(status.as_gauge());
    }
}

/// Timer for tracking flush handler duration
pub struct FlushTimer {
    start: Instant,
    trigger: FlushTrigger,
    metrics: BatcherMetrics,
}

impl FlushTimer {
    /// Start timing a flush
    pub fn start(metrics: &BatcherMetrics, trigger: FlushTrigger) -> Self {
        Self {
            start: Instant::now(),
            trigger,
            metrics: metrics.clone(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        self.metrics.record_flush_duration(self.trigger, duration);
        duration
    }
}

/// Point-in-time snapshot of a batcher's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Items accepted by the worker
    pub accepted: u64,
    /// Items dropped because shutdown had begun
    pub rejected: u64,
    /// Flushes caused by reaching capacity
    pub size_flushes: u64,
    /// Flushes caused by the group timer
    pub timeout_flushes: u64,
    /// Final flushes performed on shutdown
    pub shutdown_flushes: u64,
    /// Flushes whose handler failed or panicked
    pub failed_flushes: u64,
    /// Current streak of failed flushes
    pub consecutive_failures: u64,
}

impl BatcherStats {
    /// Total number of flush handler invocations
    pub fn total_flushes(&self) -> u64 {
        self.size_flushes + self.timeout_flushes + self.shutdown_flushes
    }
}

/// Lock-free counters shared between the worker and the handle
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    accepted: AtomicU64,
    rejected: AtomicU64,
    size_flushes: AtomicU64,
    timeout_flushes: AtomicU64,
    shutdown_flushes: AtomicU64,
    failed_flushes: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, count: usize) {
        self.rejected.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger) {
        let counter = match trigger {
            FlushTrigger::Size => &self.size_flushes,
            FlushTrigger::Timeout => &self.timeout_flushes,
            FlushTrigger::Shutdown => &self.shutdown_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful flush, resetting the failure streak
    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Record a failed flush, returning the new failure streak
    pub(crate) fn record_failure(&self) -> u64 {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> BatcherStats {
        BatcherStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            size_flushes: self.size_flushes.load(Ordering::Relaxed),
            timeout_flushes: self.timeout_flushes.load(Ordering::Relaxed),
            shutdown_flushes: self.shutdown_flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}
