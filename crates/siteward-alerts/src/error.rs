//! Error taxonomy for alerting, notification, and feedback tracking.

use thiserror::Error;

/// Errors produced by `siteward-alerts`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad input from a caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// A notification channel failed to deliver. Retried by the router
    /// per its backoff policy; only surfaced once retries are exhausted.
    #[error("delivery error: {0}")]
    Delivery(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
