//! Error types for liaison-health.

use thiserror::Error;

/// Result type for liaison-health operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by membership reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// The directory scan failed; the tick is skipped.
    #[error("directory scan failed: {0}")]
    Scan(#[source] liaison_protocols::Error),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] liaison_protocols::Error),
}
