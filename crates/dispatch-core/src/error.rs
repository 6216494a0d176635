//! Error types for the dispatch board

use thiserror::Error;

/// Core dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    // Wire errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    // Board errors
    #[error("Encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    // Session errors
    #[error("Session hub stopped")]
    HubStopped,
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
