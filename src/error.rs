//! Error types for usagegate.

use thiserror::Error;

/// Main error type for usagegate operations.
#[derive(Error, Debug)]
pub enum UsageGateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store errors that are not plain I/O
    #[error("Counter store error: {0}")]
    Store(String),

    /// A gate or counter name that the registry does not know
    #[error("Unknown gate: {0}")]
    UnknownGate(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors from the file store
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for usagegate operations.
pub type Result<T> = std::result::Result<T, UsageGateError>;
