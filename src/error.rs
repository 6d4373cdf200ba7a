//! Error types for batcher operations.

use thiserror::Error;

/// Result type for batcher operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Error types for batcher operations
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration error - detected at construction, the batcher never starts
    ///
    /// Examples: zero capacity, empty name, unreadable config file
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Submission rejected because shutdown had already begun
    ///
    /// `accepted` counts the leading items of the same call that were handed to
    /// the worker before shutdown was detected. Those items will be flushed,
    /// the rest were dropped.
    #[error("Batcher is closed ({accepted} item(s) accepted before shutdown)")]
    Closed { accepted: usize },

    /// The flush handler returned an error or panicked
    #[error("Flush callback failed: {message}")]
    CallbackFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Runtime error - no Tokio runtime available, or the worker task failed
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BatchError {
    /// Check if this error is a shutdown rejection
    pub fn is_closed(&self) -> bool {
        matches!(self, BatchError::Closed { .. })
    }

    /// Check if this error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, BatchError::InvalidConfiguration(_))
    }

    /// Check if this error came from the flush handler
    pub fn is_callback_failure(&self) -> bool {
        matches!(self, BatchError::CallbackFailure { .. })
    }

    /// Number of items accepted before a shutdown rejection, if this is one
    pub fn accepted(&self) -> Option<usize> {
        match self {
            BatchError::Closed { accepted } => Some(*accepted),
            _ => None,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BatchError::InvalidConfiguration(message.into())
    }

    /// Create a shutdown rejection
    pub fn closed(accepted: usize) -> Self {
        BatchError::Closed { accepted }
    }

    /// Create a callback failure from a message
    pub fn callback(message: impl Into<String>) -> Self {
        BatchError::CallbackFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Create a callback failure with source
    pub fn callback_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BatchError::CallbackFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        BatchError::Runtime(message.into())
    }
}

impl From<tokio::task::JoinError> for BatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        BatchError::Runtime(format!("batcher worker task failed: {}", err))
    }
}
