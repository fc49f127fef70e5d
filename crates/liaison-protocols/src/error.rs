//! Error types for liaison-protocols.

use std::time::Duration;

use thiserror::Error;

/// Result type for liaison-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while moving envelopes or talking to the directory.
#[derive(Debug, Error)]
pub enum Error {
    /// No route to the named endpoint (not attached, connection refused, ...).
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The transport failed after a route was found.
    #[error("transport error: {0}")]
    Transport(String),

    /// The directory service rejected or failed a request.
    #[error("directory error: {0}")]
    Directory(String),

    /// An envelope or protocol line could not be interpreted.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A bounded wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the peer could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }
}
