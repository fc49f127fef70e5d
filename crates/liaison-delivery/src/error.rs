//! Error types for liaison-delivery.

use thiserror::Error;

/// Result type for liaison-delivery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in delivery and notification.
#[derive(Debug, Error)]
pub enum Error {
    /// The notification sink could not be reached or written to.
    #[error("notification sink {addr}: {source}")]
    Sink {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The delivery task was aborted or panicked before finishing.
    #[error("delivery task did not finish: {0}")]
    TaskAborted(String),
}
