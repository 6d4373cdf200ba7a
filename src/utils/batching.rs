//! Pending group state for size- and time-triggered batching.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// What caused a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The group reached capacity
    Size,
    /// The group's timer expired before capacity was reached
    Timeout,
    /// The batcher was shut down with a non-empty group
    Shutdown,
}

impl FlushTrigger {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Timeout => "timeout",
            FlushTrigger::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered group of items accumulated since the last flush, with a
/// one-shot deadline armed by the group's first item.
///
/// The deadline is a stored timestamp rather than a running timer: it is set
/// when the group goes from empty to non-empty (and the timeout is non-zero),
/// and cleared whenever the group is handed out.
#[derive(Debug)]
pub struct PendingGroup<T> {
    items: Vec<T>,
    capacity: usize,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl<T> PendingGroup<T> {
    /// Create an empty group
    ///
    /// `capacity` is expected to be > 0 (validated by `BatcherConfig`);
    /// a zero `timeout` disables the deadline.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            timeout,
            deadline: None,
        }
    }

    /// Append an item received at `now`
    ///
    /// Returns the full group, in arrival order, when this item brings it to
    /// capacity. The group is then empty and the deadline disarmed.
    pub fn push(&mut self, item: T, now: Instant) -> Option<Vec<T>> {
        if self.items.is_empty() && !self.timeout.is_zero() {
            self.deadline = Some(now + self.timeout);
        }
        self.items.push(item);

        if self.items.len() >= self.capacity {
            Some(self.take())
        } else {
            None
        }
    }

    /// Hand out all pending items and disarm the deadline
    pub fn take(&mut self) -> Vec<T> {
        self.deadline = None;
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    /// When the current group times out, if the deadline is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check if the deadline is armed and has passed at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Check if the group is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the current group size
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maximum group size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a reference to the items without flushing
    pub fn items(&self) -> &[T] {
        &self.items
    }
}
