//! Error taxonomy for the detection core.
//!
//! `Validation` surfaces to callers directly. `Collaborator` never
//! leaves a sub-component: the pipeline catches it and degrades that
//! sub-classifier to "no signal" rather than failing the whole run.

use thiserror::Error;

/// Errors produced by `siteward-core`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad input from a caller (missing URL, malformed request, etc.).
    /// Never retried; surfaced directly.
    #[error("validation error: {0}")]
    Validation(String),

    /// An external collaborator (AI model, vector store) failed.
    /// Sub-components catch this themselves and degrade to "no signal";
    /// it should never escape the pipeline.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// A regex pattern in the bank failed to compile. Treated as fatal
    /// at startup since the bank is meant to be validated once.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
