//! One-way lifecycle of a batcher: `Open` → `Closing` → `Terminated`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of a batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting items, worker running
    Open,
    /// Shutdown requested, worker finishing its final flush
    Closing,
    /// Worker has exited; no items will ever be accepted again
    Terminated,
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const TERMINATED: u8 = 2;

/// Shared lifecycle cell, written by the handle and the worker
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle(Arc<AtomicU8>);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(OPEN)))
    }

    pub(crate) fn state(&self) -> LifecycleState {
        match self.0.load(Ordering::Acquire) {
            OPEN => LifecycleState::Open,
            CLOSING => LifecycleState::Closing,
            _ => LifecycleState::Terminated,
        }
    }

    /// Move `Open` → `Closing`; returns false if shutdown had already begun
    pub(crate) fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn terminate(&self) {
        self.0.store(TERMINATED, Ordering::Release);
    }
}
