// tokenbucket-core/src/bucket.rs
//! The client-side `TokenBucket` handle.
//!
//! A handle is a cheap, cloneable sender into the coordinator's mailbox plus a
//! shutdown token. Every operation that needs the token count becomes a message
//! with a `oneshot` reply channel.

use log::debug;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::{BucketConfig, BucketSettings, RefillSchedule};
use crate::coordinator::{Command, Coordinator};
use crate::errors::BucketError;

/// A token bucket rate limiter.
///
/// The bucket starts full and refills by `schedule().increment` tokens every
/// `schedule().period`, never exceeding its capacity. Clones share the same
/// bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
    capacity: u64,
    schedule: RefillSchedule,
}

impl TokenBucket {
    /// Creates a full bucket that adds one token every `refill_interval`, up to `capacity`.
    ///
    /// Must be called from within a Tokio runtime, since it spawns the coordinator task.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a zero interval or zero capacity, `NoRuntime`
    /// outside a runtime.
    pub fn new(refill_interval: Duration, capacity: u64) -> Result<Self, BucketError> {
        Self::from_settings(BucketSettings::new(refill_interval, capacity)?)
    }

    pub fn from_config(config: &BucketConfig) -> Result<Self, BucketError> {
        Self::from_settings(config.settings()?)
    }

    pub fn from_settings(settings: BucketSettings) -> Result<Self, BucketError> {
        let runtime = Handle::try_current().map_err(|_| BucketError::NoRuntime)?;
        let (commands, rx) = mpsc::channel(settings.mailbox_capacity);
        let shutdown = CancellationToken::new();

        Coordinator::new(settings.capacity, settings.schedule).spawn(&runtime, rx, shutdown.clone());
        debug!(
            "Created token bucket: capacity={}, {:.3} tokens/s",
            settings.capacity,
            settings.schedule.tokens_per_second()
        );

        Ok(Self {
            commands,
            shutdown,
            capacity: settings.capacity,
            schedule: settings.schedule,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn schedule(&self) -> RefillSchedule {
        self.schedule
    }

    /// Attempts to take `count` tokens right now.
    ///
    /// Returns `Ok(false)` when the bucket holds fewer than `count` tokens; the
    /// request is not queued and nothing is consumed. A `count` of zero is
    /// refused without contacting the coordinator.
    pub async fn acquire(&self, count: u64) -> Result<bool, BucketError> {
        if count < 1 {
            return Ok(false);
        }
        self.call(|reply| Command::Acquire { count, reply }, None).await
    }

    /// Like [`acquire`](Self::acquire), but gives up with `Cancelled` once `cancel` fires.
    pub async fn acquire_cancellable(
        &self,
        count: u64,
        cancel: &CancellationToken,
    ) -> Result<bool, BucketError> {
        if count < 1 {
            return Ok(false);
        }
        self.call(|reply| Command::Acquire { count, reply }, Some(cancel)).await
    }

    /// Waits until `count` tokens can be taken, then takes them.
    ///
    /// Waiting requests are served in arrival order among themselves, but
    /// fail-fast [`acquire`](Self::acquire) calls may take tokens ahead of them.
    pub async fn acquire_wait(&self, count: u64) -> Result<(), BucketError> {
        self.wait(count, None).await
    }

    /// Like [`acquire_wait`](Self::acquire_wait), but gives up with `Cancelled`
    /// once `cancel` fires. A cancelled wait consumes no tokens.
    pub async fn acquire_wait_cancellable(
        &self,
        count: u64,
        cancel: &CancellationToken,
    ) -> Result<(), BucketError> {
        self.wait(count, Some(cancel)).await
    }

    /// A snapshot of the tokens currently in the bucket.
    ///
    /// Other callers may change the count as soon as this returns, so treat the
    /// value as advisory.
    pub async fn available_tokens(&self) -> Result<u64, BucketError> {
        self.call(|reply| Command::Available { reply }, None).await
    }

    /// Stops the coordinator. Safe to call more than once, from any clone.
    ///
    /// Does not wait for in-flight requests; those, and every later call, fail
    /// with `Closed`.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("Shutdown requested for token bucket.");
        }
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled() || self.commands.is_closed()
    }

    async fn wait(&self, count: u64, cancel: Option<&CancellationToken>) -> Result<(), BucketError> {
        if count == 0 {
            return Ok(());
        }
        if count > self.capacity {
            return Err(BucketError::ExceedsCapacity {
                requested: count,
                capacity: self.capacity,
            });
        }
        self.call(|reply| Command::Wait { count, reply }, cancel).await
    }

    /// Sends one command and awaits its reply.
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, BucketError> {
        if self.shutdown.is_cancelled() {
            return Err(BucketError::Closed);
        }

        let (reply, mut response) = oneshot::channel();
        let send = self.commands.send(build(reply));

        let Some(token) = cancel else {
            send.await.map_err(|_| BucketError::Closed)?;
            return response.await.map_err(|_| BucketError::Closed);
        };

        // Dropping an unfinished send leaves the mailbox untouched.
        tokio::select! {
            biased;
            sent = send => sent.map_err(|_| BucketError::Closed)?,
            _ = token.cancelled() => return Err(BucketError::Cancelled),
        }

        tokio::select! {
            biased;
            result = &mut response => result.map_err(|_| BucketError::Closed),
            _ = token.cancelled() => {
                // Closing first makes any later coordinator reply fail, which
                // triggers its refund. A reply that already arrived is kept.
                response.close();
                response.try_recv().map_err(|_| BucketError::Cancelled)
            }
        }
    }
}
