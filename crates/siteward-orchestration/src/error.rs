//! Error taxonomy for queueing and worker-pool orchestration.

use thiserror::Error;

/// Errors produced by `siteward-orchestration`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The queue was at capacity when an enqueue was attempted.
    #[error("queue is full (max {max})")]
    QueueFull {
        /// The queue's configured maximum length.
        max: usize,
    },

    /// A collaborator (pipeline, alert generator, router, storage) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
