//! Error types for liaison-node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while hosting an agent.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or directory error
    #[error("Protocol error: {0}")]
    Protocol(#[from] liaison_protocols::Error),

    /// Reconciler error
    #[error("Health error: {0}")]
    Health(#[from] liaison_health::Error),

    /// Delivery task error
    #[error("Delivery error: {0}")]
    Delivery(#[from] liaison_delivery::Error),

    /// Monitor event sink error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// External translator or evaluator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
