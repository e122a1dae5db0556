//! Fetch error type: transport failures surfaced to the per-key result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, TLS, etc.).
    #[error("{0}")]
    Transport(#[from] curl::Error),
    /// The blocking fetch task panicked or was cancelled.
    #[error("fetch task failed: {0}")]
    Join(String),
}
