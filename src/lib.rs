//! # Batcher Core
//!
//! A size- and time-triggered batching primitive for Tokio applications.
//!
//! A [`Batcher`] accumulates items delivered by any number of producer tasks
//! and forwards them, as ordered groups, to a flush handler. A group is
//! flushed by whichever happens first: it reaches the configured capacity, or
//! the configured timeout elapses since the group's first item. Use it to
//! amortize per-operation overhead (bulk writes, batched network sends,
//! aggregated logging) over many small inputs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batcher_core::Batcher;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> batcher_core::BatchResult<()> {
//!     let batcher = Arc::new(Batcher::new(3, Duration::from_millis(100), |batch: Vec<u32>| {
//!         println!("flushed {:?}", batch);
//!     })?);
//!
//!     let producer = batcher.clone();
//!     tokio::spawn(async move { producer.add([1, 2, 3, 4]).await }).await.ok();
//!
//!     // [4] is still pending: close flushes it
//!     batcher.close().await
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Exact partition**: every accepted item appears in exactly one flushed
//!   group; items from one producer keep their submission order.
//! - **Sequential flushes**: a single worker task owns the pending group and
//!   runs the handler, so flushes never overlap.
//! - **One trigger per group**: a group is cleared the instant either trigger
//!   fires, so it is never flushed twice.
//! - **Backpressure**: producers wait while the worker is busy flushing.
//! - **Graceful shutdown**: [`Batcher::close`] flushes the pending group once
//!   more and is idempotent.
//!
//! ## Features
//!
//! - **Async handlers**: implement [`FlushHandler`] for fallible or async sinks
//! - **Failure policies**: isolate handler failures or stop the batcher ([`FailurePolicy`])
//! - **Observability**: structured `tracing` logs, `metrics` counters, [`BatcherStats`], [`HealthStatus`]
//! - **Configuration**: programmatic, TOML file, or environment variables ([`BatcherConfig`])

mod batcher;
mod config;
mod error;
mod metrics;
mod runtime;
mod traits;
pub mod utils;

// Re-export public API
pub use batcher::Batcher;
pub use config::{BatcherConfig, FailurePolicy};
pub use error::{BatchError, BatchResult};
pub use metrics::{BatcherMetrics, BatcherStats, FlushTimer};
pub use runtime::{init_tracing, LifecycleState};
pub use traits::{flush_fn, try_flush_fn, FlushFn, FlushHandler, TryFlushFn};
pub use utils::{FlushTrigger, HealthStatus, PendingGroup};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
