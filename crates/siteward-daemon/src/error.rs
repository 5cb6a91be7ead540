//! Error taxonomy for the orchestrator binary's startup path.

use thiserror::Error;

/// Errors that can prevent the daemon from starting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    #[error("startup failed: {0}")]
    Startup(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
