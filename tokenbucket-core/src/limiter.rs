// tokenbucket-core/src/limiter.rs
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::time::{self, Duration};

use crate::bucket::TokenBucket;
use crate::errors::BucketError;

/// Anything that can hand out tokens without blocking.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempts to take `count` tokens. `Ok(false)` means "not right now".
    async fn try_acquire(&self, count: u64) -> Result<bool, BucketError>;

    /// Advisory count of tokens currently available.
    async fn available(&self) -> Result<u64, BucketError>;
}

pub type SharedLimiter = Arc<dyn RateLimiter>;

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn try_acquire(&self, count: u64) -> Result<bool, BucketError> {
        self.acquire(count).await
    }

    async fn available(&self) -> Result<u64, BucketError> {
        self.available_tokens().await
    }
}

/// How [`acquire_with_retry`] spaces out its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between a refused attempt and the next one.
    pub pause: Duration,
    /// `None` retries until granted.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(100),
            max_attempts: None,
        }
    }
}

/// Client-side retry loop around a fail-fast limiter.
///
/// Returns `Ok(true)` once granted and `Ok(false)` when `max_attempts` refusals
/// have been seen. Errors such as `Closed` end the loop immediately.
pub async fn acquire_with_retry(
    limiter: &dyn RateLimiter,
    count: u64,
    policy: RetryPolicy,
) -> Result<bool, BucketError> {
    if count < 1 {
        return Ok(false);
    }

    let mut attempts: u32 = 0;
    loop {
        if limiter.try_acquire(count).await? {
            return Ok(true);
        }
        attempts = attempts.saturating_add(1);
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            debug!("Giving up on {} tokens after {} attempts.", count, attempts);
            return Ok(false);
        }
        debug!("Failed to get {} tokens, waiting {:?}", count, policy.pause);
        time::sleep(policy.pause).await;
    }
}
