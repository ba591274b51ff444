//! Error types for the command bus and the whiteboard layer.

use thiserror::Error;

/// Errors raised by the dispatch engine, the bus and the scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Subscription at index {0} is not paused")]
    NotPaused(usize),

    #[error("Subscription has been unsubscribed")]
    Unsubscribed,

    #[error("Dispatcher has been dropped")]
    Closed,

    #[error("Scheduler did not settle within {0} ticks")]
    TickLimitExceeded(usize),
}

/// Main error type for whiteboard operations.
#[derive(Debug, Error)]
pub enum WhiteboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("No model found in storage: {0}")]
    ModelNotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for WhiteboardError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            WhiteboardError::Deserialization(e.to_string())
        } else {
            WhiteboardError::Serialization(e.to_string())
        }
    }
}

/// Result type for whiteboard operations.
pub type Result<T> = std::result::Result<T, WhiteboardError>;
