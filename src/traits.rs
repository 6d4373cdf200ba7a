//! Flush handler definitions.
//!
//! A batcher hands every flushed group to a [`FlushHandler`]. Plain closures
//! can be adapted with [`flush_fn`] (infallible) or [`try_flush_fn`] (fallible).

use crate::BatchResult;
use async_trait::async_trait;

/// Consumer of flushed groups
///
/// The handler is owned by the batcher's worker task and is only ever called
/// from it, so `flush` never runs concurrently with itself. Each group is
/// moved into the handler; the batcher keeps no reference to it.
///
/// # Example
///
/// ```rust,no_run
/// use batcher_core::{BatchError, BatchResult, FlushHandler};
/// use async_trait::async_trait;
///
/// struct BulkInsert {
///     rows_written: usize,
/// }
///
/// #[async_trait]
/// impl FlushHandler<String> for BulkInsert {
///     async fn flush(&mut self, batch: Vec<String>) -> BatchResult<()> {
///         if batch.iter().any(|row| row.is_empty()) {
///             return Err(BatchError::callback("empty row in batch"));
///         }
///         // self.database.insert_many(&batch).await?;
///         self.rows_written += batch.len();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait FlushHandler<T: Send + 'static>: Send + 'static {
    /// Consume one flushed group, in arrival order
    ///
    /// # Return Value
    ///
    /// - `Ok(())`: group handled
    /// - `Err(_)`: treated as a callback failure and handled according to the
    ///   batcher's `FailurePolicy`. The group is not retried.
    ///
    /// A panic inside `flush` is caught and treated the same as an `Err`.
    async fn flush(&mut self, batch: Vec<T>) -> BatchResult<()>;

    /// Optional: called once after the final flush, before the worker exits
    ///
    /// Use this to flush downstream buffers or close connections.
    async fn shutdown(&mut self) -> BatchResult<()> {
        Ok(())
    }
}

/// Adapter returned by [`flush_fn`]
pub struct FlushFn<F>(F);

/// Adapt an infallible closure into a [`FlushHandler`]
pub fn flush_fn<F>(f: F) -> FlushFn<F> {
    FlushFn(f)
}

#[async_trait]
impl<T, F> FlushHandler<T> for FlushFn<F>
where
    T: Send + 'static,
    F: FnMut(Vec<T>) + Send + 'static,
{
    async fn flush(&mut self, batch: Vec<T>) -> BatchResult<()> {
        (self.0)(batch);
        Ok(())
    }
}

/// Adapter returned by [`try_flush_fn`]
pub struct TryFlushFn<F>(F);

/// Adapt a fallible closure into a [`FlushHandler`]
pub fn try_flush_fn<F>(f: F) -> TryFlushFn<F> {
    TryFlushFn(f)
}

#[async_trait]
impl<T, F> FlushHandler<T> for TryFlushFn<F>
where
    T: Send + 'static,
    F: FnMut(Vec<T>) -> BatchResult<()> + Send + 'static,
{
    async fn flush(&mut self, batch: Vec<T>) -> BatchResult<()> {
        (self.0)(batch)
    }
}
