// tokenbucket-core/src/lib.rs
//! # tokenbucket-core
//!
//! `tokenbucket-core` provides a token bucket rate limiter for Tokio programs in
//! which many tasks compete for a shared allowance. The bucket starts full,
//! drains as callers take tokens, and refills on a fixed tick up to its capacity.
//!
//! The token count is owned by a single coordinator task. Callers never touch it
//! directly: each operation is a message on the coordinator's mailbox answered
//! over a `oneshot` channel, so all mutation is serialized without a lock.
//!
//! ## Modules
//!
//! * `config`: `BucketConfig` (YAML), validated `BucketSettings` and the `RefillSchedule` arithmetic.
//! * `bucket`: the cloneable `TokenBucket` client handle.
//! * `coordinator`: the task that owns the count (crate-private).
//! * `limiter`: the `RateLimiter` trait and a client-side retry helper.
//! * `errors`: the `BucketError` type.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::time::Duration;
//! use tokenbucket_core::{BucketError, TokenBucket};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BucketError> {
//!     // One token every 100ms, at most 5 in the bucket.
//!     let bucket = TokenBucket::new(Duration::from_millis(100), 5)?;
//!
//!     assert!(bucket.acquire(5).await?);
//!     assert!(!bucket.acquire(1).await?);
//!
//!     // Wait for the next refill instead of failing.
//!     bucket.acquire_wait(1).await?;
//!
//!     bucket.shutdown();
//!     assert_eq!(bucket.available_tokens().await, Err(BucketError::Closed));
//!     Ok(())
//! }
//! ```
//!
//! ## Refill Granularity
//!
//! The coordinator never ticks more often than every 50ms. A faster requested
//! rate is expressed as a larger per-tick increment, rounded down, so the
//! effective rate never exceeds the requested one.
//!
//! ---
//! License: MIT OR Apache-2.0

pub mod bucket;
pub mod config;
mod coordinator;
pub mod errors;
pub mod limiter;

/// Re-exports the client handle.
pub use bucket::TokenBucket;

/// Re-exports configuration types and the refill constants.
pub use config::{
    BucketConfig,
    BucketSettings,
    RefillSchedule,
    DEFAULT_MAILBOX_CAPACITY,
    MIN_TICK_GRANULARITY,
};

pub use errors::BucketError;

pub use limiter::{acquire_with_retry, RateLimiter, RetryPolicy, SharedLimiter};

/// Re-exported so callers can build cancellation tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
