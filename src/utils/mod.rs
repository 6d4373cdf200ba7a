//! Building blocks shared by the batcher runtime.

pub mod batching;
pub mod health;

// Re-export commonly used types
pub use batching::{FlushTrigger, PendingGroup};
pub use health::HealthStatus;
