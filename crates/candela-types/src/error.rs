//! Error types shared across the candela workspace.

use thiserror::Error;

/// Result type alias for candela operations.
pub type Result<T> = std::result::Result<T, CandelaError>;

/// Errors that can occur while aggregating, storing, or publishing candles.
#[derive(Error, Debug)]
pub enum CandelaError {
    /// Durable store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// Live cache or pub/sub operation failed.
    #[error("publish error: {0}")]
    Publish(String),

    /// HTTP request to the historical-data collaborator failed.
    #[error("http error: {0}")]
    Http(String),

    /// Invalid data received from a collaborator.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
