//! Error types for Loopview
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Loopview
#[derive(Debug, Error)]
pub enum LoopViewError {
    /// A view signal could not be buffered because the queue is full
    #[error("Signal queue overflow: {capacity} signals already queued while no observer is attached")]
    QueueOverflow { capacity: usize },

    /// The startup computation failed
    #[error("Init failed: {0}")]
    Init(String),

    /// Invalid state or misuse of an API
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An event was pushed into a loop that has already been disposed
    #[error("Loop disposed")]
    LoopDisposed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LoopViewError {
    /// True for the overflow condition raised by a full signal queue
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::QueueOverflow { .. })
    }
}

/// Result type alias for Loopview operations
pub type Result<T> = std::result::Result<T, LoopViewError>;
