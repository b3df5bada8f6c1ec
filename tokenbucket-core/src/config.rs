//! Configuration management for `tokenbucket-core`.
//!
//! This module defines the user-facing `BucketConfig` (deserializable from YAML),
//! the validated `BucketSettings` a bucket is actually built from, and the
//! `RefillSchedule` arithmetic that turns a requested refill interval into a
//! tick period and a per-tick increment.
//!
//! License: MIT OR Apache-2.0

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::BucketError;

/// The coordinator never ticks faster than this.
pub const MIN_TICK_GRANULARITY: Duration = Duration::from_millis(50);

/// Depth of the request channel feeding the coordinator.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 25;

/// How often the coordinator ticks and how many tokens each tick adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillSchedule {
    /// Wall-clock time between two ticks.
    pub period: Duration,
    /// Tokens added on every tick. Always at least 1.
    pub increment: u64,
}

impl RefillSchedule {
    /// Derives the tick plan for a requested "one token every `refill_interval`" rate.
    ///
    /// Intervals shorter than `min_tick` are folded into a single tick of length
    /// `min_tick` that adds `floor(min_tick / refill_interval)` tokens. Rounding
    /// down means the effective rate never exceeds the requested one.
    pub fn new(refill_interval: Duration, min_tick: Duration) -> Result<Self, BucketError> {
        if refill_interval.is_zero() {
            return Err(BucketError::invalid("refill interval must be a positive duration"));
        }
        if min_tick.is_zero() {
            return Err(BucketError::invalid("minimum tick granularity must be a positive duration"));
        }

        if refill_interval >= min_tick {
            return Ok(Self {
                period: refill_interval,
                increment: 1,
            });
        }

        let ratio = min_tick.as_nanos() / refill_interval.as_nanos();
        let increment = u64::try_from(ratio).unwrap_or(u64::MAX);
        Ok(Self {
            period: min_tick,
            increment,
        })
    }

    /// The refill rate this schedule delivers, in tokens per second.
    pub fn tokens_per_second(&self) -> f64 {
        self.increment as f64 / self.period.as_secs_f64()
    }
}

/// Validated parameters a `TokenBucket` is spawned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSettings {
    pub capacity: u64,
    pub schedule: RefillSchedule,
    pub mailbox_capacity: usize,
}

impl BucketSettings {
    /// Settings with the default tick granularity and mailbox depth.
    pub fn new(refill_interval: Duration, capacity: u64) -> Result<Self, BucketError> {
        Self::with_limits(refill_interval, capacity, MIN_TICK_GRANULARITY, DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn with_limits(
        refill_interval: Duration,
        capacity: u64,
        min_tick: Duration,
        mailbox_capacity: usize,
    ) -> Result<Self, BucketError> {
        if capacity == 0 {
            return Err(BucketError::invalid("capacity must be greater than zero"));
        }
        if mailbox_capacity == 0 {
            return Err(BucketError::invalid("mailbox capacity must be greater than zero"));
        }
        let schedule = RefillSchedule::new(refill_interval, min_tick)?;
        Ok(Self {
            capacity,
            schedule,
            mailbox_capacity,
        })
    }
}

/// File-level description of a bucket.
///
/// ```yaml
/// refill_interval_ms: 25
/// capacity: 1000
/// min_tick_ms: 50        # optional
/// mailbox_capacity: 25   # optional
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BucketConfig {
    /// Requested time between single-token refills, in milliseconds.
    pub refill_interval_ms: f64,
    /// Maximum number of tokens the bucket holds.
    pub capacity: u64,
    #[serde(default = "default_min_tick_ms")]
    pub min_tick_ms: f64,
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_min_tick_ms() -> f64 {
    duration_to_millis(MIN_TICK_GRANULARITY)
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

impl BucketConfig {
    pub fn new(refill_interval: Duration, capacity: u64) -> Self {
        Self {
            refill_interval_ms: duration_to_millis(refill_interval),
            capacity,
            min_tick_ms: default_min_tick_ms(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }

    /// Validates the configuration and resolves it into `BucketSettings`.
    pub fn settings(&self) -> Result<BucketSettings, BucketError> {
        let refill_interval = millis_to_duration("refill_interval_ms", self.refill_interval_ms)?;
        let min_tick = millis_to_duration("min_tick_ms", self.min_tick_ms)?;
        BucketSettings::with_limits(refill_interval, self.capacity, min_tick, self.mailbox_capacity)
    }

    /// Parses and validates a bucket configuration from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: BucketConfig =
            serde_yml::from_str(text).context("Failed to parse bucket configuration")?;
        let settings = config.settings()?;
        debug!(
            "Parsed bucket configuration: capacity={}, period={:?}, increment={}",
            settings.capacity, settings.schedule.period, settings.schedule.increment
        );
        Ok(config)
    }

    /// Loads a bucket configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading bucket configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        info!(
            "Loaded bucket configuration from {}: capacity {}, one token every {}ms.",
            path.display(),
            config.capacity,
            config.refill_interval_ms
        );
        Ok(config)
    }
}

fn duration_to_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn millis_to_duration(field: &str, millis: f64) -> Result<Duration, BucketError> {
    if !millis.is_finite() || millis <= 0.0 {
        return Err(BucketError::invalid(format!("{field} must be a positive value, got {millis}")));
    }
    let nanos = (millis * 1_000_000.0).round();
    if nanos < 1.0 {
        return Err(BucketError::invalid(format!("{field} is below one nanosecond")));
    }
    if nanos >= u64::MAX as f64 {
        return Err(BucketError::invalid(format!("{field} is too large")));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
