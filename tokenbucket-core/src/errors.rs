//! errors.rs - Custom error types for the tokenbucket-core library.
//!
//! Running out of tokens is not an error: `acquire` reports it as `Ok(false)`.
//! The variants below cover construction problems and calls that can no longer
//! be answered.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// All error types produced by the `tokenbucket-core` library.
///
/// Marked `#[non_exhaustive]` so new variants can be added without breaking
/// downstream matches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BucketError {
    /// Raised at construction when a parameter is out of range.
    #[error("Invalid bucket configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Requested {requested} tokens but the bucket only holds {capacity}")]
    ExceedsCapacity { requested: u64, capacity: u64 },

    /// The coordinator has stopped and will never answer again.
    #[error("The token bucket has been shut down")]
    Closed,

    #[error("The request was cancelled before the bucket answered")]
    Cancelled,

    #[error("A token bucket must be created from within a Tokio runtime")]
    NoRuntime,
}

impl BucketError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BucketError::InvalidConfiguration(reason.into())
    }
}
