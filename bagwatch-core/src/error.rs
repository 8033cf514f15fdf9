//! Core error types for `bagwatch`.

use thiserror::Error;

/// Core error type for `bagwatch` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data from an API response or user input.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A notification could not be delivered.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
