//! Token-bucket limiter for outbound provider requests.
//!
//! The bucket holds at most `capacity` tokens. At every period boundary it is reset to
//! `capacity`; unused tokens never carry over. Callers withdraw `cost` tokens under a
//! single mutex and sleep until the next boundary when the bucket is short. A caller
//! that cannot be served before `max_wait` elapses gets [`RateLimitError::Timeout`].
//!
//! One [`RateLimiter`] is built at startup and shared (`Arc`) by every client that talks
//! to the same provider account.

mod error;


pub use error::{RateLimitError, RateLimitResult};

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::constants::{DEFAULT_RATE_MAX_WAIT, DEFAULT_RATE_PERIOD, DEFAULT_REQUESTS_PER_PERIOD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Tokens granted per period.
    pub capacity: u32,
    /// Refill period.
    pub period: Duration,
    /// Longest a single `acquire` may wait.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REQUESTS_PER_PERIOD,
            period: DEFAULT_RATE_PERIOD,
            max_wait: DEFAULT_RATE_MAX_WAIT,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        if config.period.is_zero() {
            self.tokens = config.capacity;
            return;
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < config.period {
            return;
        }

        // Align to the current window so boundaries stay on a fixed grid.
        let into_window = elapsed.as_nanos() % config.period.as_nanos();
        self.window_start = now - Duration::from_nanos(into_window as u64);
        self.tokens = config.capacity;
    }

    fn next_refill(&self, config: &RateLimitConfig) -> Instant {
        self.window_start + config.period
    }
}

/// Shared token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a full bucket whose first period starts now.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: config.capacity,
                window_start: Instant::now(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits until `cost` tokens can be withdrawn and returns how long that took.
    ///
    /// Fails fast with [`RateLimitError::Timeout`] as soon as the next refill lies past
    /// the wait deadline, since no tokens can appear before then.
    pub async fn acquire(&self, cost: u32) -> RateLimitResult<Duration> {
        if cost > self.config.capacity {
            return Err(RateLimitError::CostExceedsCapacity {
                cost,
                capacity: self.config.capacity,
            });
        }

        let started = Instant::now();
        let deadline = started + self.config.max_wait;

        loop {
            let next_refill = {
                let mut bucket = self.bucket.lock();
                let now = Instant::now();
                bucket.refill(now, &self.config);

                if bucket.tokens >= cost {
                    bucket.tokens -= cost;
                    return Ok(now.saturating_duration_since(started));
                }
                bucket.next_refill(&self.config)
            };

            if next_refill > deadline {
                return Err(RateLimitError::Timeout {
                    cost,
                    waited: Instant::now().saturating_duration_since(started),
                    max_wait: self.config.max_wait,
                });
            }

            debug!(
                cost,
                wait_ms = next_refill
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64,
                "rate limit bucket short, waiting for refill"
            );
            sleep_until(next_refill).await;
        }
    }

    /// Withdraws `cost` tokens if they are available right now.
    pub fn try_acquire(&self, cost: u32) -> bool {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now(), &self.config);
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (after applying any due refill).
    pub fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now(), &self.config);
        bucket.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
