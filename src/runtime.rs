//! Runtime for the batcher worker.
//!
//! Each batcher owns exactly one worker task, spawned on the ambient Tokio
//! runtime at construction and stopped by `close()`:
//! - `worker`: the control loop that owns the pending group and its timer
//! - `lifecycle`: the one-way `Open` → `Closing` → `Terminated` state

mod lifecycle;
mod worker;

pub(crate) use lifecycle::Lifecycle;
pub(crate) use worker::{Envelope, Worker, WorkerLinks};

pub use lifecycle::LifecycleState;

use crate::BatcherConfig;

/// Initialize tracing/logging
///
/// Uses `RUST_LOG` when set, otherwise `config.log_level`. Does nothing if a
/// global subscriber is already installed. The batcher never calls this on
/// its own; applications and demos opt in.
pub fn init_tracing(config: &BatcherConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok(); // Ignore if already initialized
}
