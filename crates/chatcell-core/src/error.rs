//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport setup or fetch failed.
    #[error("Transport error: {0}")]
    Transport(#[from] crate::media::TransportError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
