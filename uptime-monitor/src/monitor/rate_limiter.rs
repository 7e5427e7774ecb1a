//! Rate limiting for outgoing alerts.
//!
//! Implements a continuous token bucket per key. Buckets refill based on
//! the wall-clock time elapsed since they were last touched, so fractional
//! tokens accumulate between calls and the result does not depend on how
//! often the limiter is polled.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::{Error, Result};

/// Source of the current instant for a [`RateLimiter`].
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Useful for simulations and deterministic tests of refill timing.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Configuration for a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterConfig {
    /// Maximum tokens a bucket can hold (burst capacity).
    pub burst: f64,
    /// Seconds for an empty bucket to refill completely.
    pub window_secs: f64,
}

impl RateLimiterConfig {
    pub fn new(burst: f64, window_secs: f64) -> Self {
        Self { burst, window_secs }
    }

    /// Check that both values are positive finite numbers.
    pub fn validate(&self) -> Result<()> {
        if !self.burst.is_finite() || self.burst <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "burst must be a positive finite number, got {}",
                self.burst
            )));
        }
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "window must be a positive finite number of seconds, got {}",
                self.window_secs
            )));
        }
        Ok(())
    }

    /// Tokens added per millisecond.
    pub fn refill_rate(&self) -> f64 {
        self.burst / self.window_millis()
    }

    fn window_millis(&self) -> f64 {
        self.window_secs * 1000.0
    }
}

/// State for a single key.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    /// Available tokens, always within `[0, burst]`.
    tokens: f64,
    last_refill: Instant,
}

/// Keyed token bucket rate limiter.
///
/// The limiter does no locking of its own. Share it between tasks by
/// wrapping it in a mutex, as [`crate::monitor::AlertDispatcher`] does.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: HashMap<String, TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter driven by the system clock.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter driven by `clock`.
    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buckets: HashMap::new(),
            clock,
        })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Whether one unit is available for `key` right now.
    ///
    /// Applies the refill but never consumes.
    pub fn is_allowed(&mut self, key: &str) -> Result<bool> {
        let bucket = self.refilled_bucket(key)?;
        Ok(bucket.tokens >= 1.0)
    }

    /// Take one token for `key`.
    ///
    /// Returns `false` and leaves the bucket untouched when less than one
    /// token is available.
    pub fn consume(&mut self, key: &str) -> Result<bool> {
        let bucket = self.refilled_bucket(key)?;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            trace!(key, remaining = bucket.tokens, "token consumed");
            Ok(true)
        } else {
            trace!(key, available = bucket.tokens, "rate limited");
            Ok(false)
        }
    }

    /// Whole tokens currently available for `key`.
    pub fn token_count(&mut self, key: &str) -> Result<u32> {
        let bucket = self.refilled_bucket(key)?;
        Ok(bucket.tokens.floor() as u32)
    }

    /// Milliseconds until `key` has at least one token.
    pub fn time_until_next_token(&mut self, key: &str) -> Result<u64> {
        let config = self.config;
        let bucket = self.refilled_bucket(key)?;
        if bucket.tokens >= 1.0 {
            return Ok(0);
        }
        let missing = 1.0 - bucket.tokens;
        Ok((missing * config.window_millis() / config.burst).ceil() as u64)
    }

    /// Forget every bucket.
    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn refilled_bucket(&mut self, key: &str) -> Result<&mut TokenBucket> {
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        let now = self.clock.now();
        let config = self.config;

        let bucket = match self.buckets.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(TokenBucket {
                tokens: config.burst,
                last_refill: now,
            }),
        };

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        if !elapsed.is_zero() {
            // burst * elapsed / window keeps whole-window multiples exact.
            let gained = elapsed.as_secs_f64() * 1000.0 * config.burst / config.window_millis();
            bucket.tokens = (bucket.tokens + gained).min(config.burst);
            bucket.last_refill = now;
        }

        Ok(bucket)
    }
}
