//! Bounded retry with exponential backoff.
//!
//! [`retry`] runs an async operation until it succeeds, fails with an error classified
//! [`FailureClass::Fatal`], or uses up `max_attempts`. Between attempts it sleeps
//! `base_delay * 2^(n-1)` (capped at `max_delay`, optionally jittered, raised to any
//! retry-after hint carried by the error).
//!
//! The executor never logs. Every retry and every exhaustion is reported to a
//! [`RetryObserver`]; [`TracingRetryObserver`] turns those into log lines and the
//! embedding client adds its own usage counter.

mod error;
mod observer;


pub use error::RetryError;
pub use observer::{NoopRetryObserver, RetryEvent, RetryObserver, TracingRetryObserver};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::constants::{DEFAULT_BASE_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF};

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient: network, timeout, throttling, upstream 5xx.
    Retryable,
    /// Repeating cannot help: malformed input, auth, configuration.
    Fatal,
}

/// Errors that the retry loop can classify.
pub trait Classify {
    fn class(&self) -> FailureClass;

    /// Minimum delay requested by the remote side before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_BACKOFF,
            max_delay: DEFAULT_MAX_BACKOFF,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_before(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let mut delay = self.backoff(retry);
        if self.jitter {
            delay = jittered(delay);
        }
        match hint {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    delay.mul_f64(factor)
}

/// Runs `operation` under `policy`.
///
/// `operation` receives the 1-based attempt number. `label` names the operation in
/// observer events.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    observer: &dyn RetryObserver,
    label: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.class() == FailureClass::Fatal {
            return Err(RetryError::Fatal { attempt, error });
        }

        if attempt >= max_attempts {
            observer.on_exhausted(&RetryEvent {
                label,
                attempt,
                max_attempts,
                delay: None,
                error: error.to_string(),
            });
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_before(attempt, error.retry_after());
        observer.on_retry(&RetryEvent {
            label,
            attempt,
            max_attempts,
            delay: Some(delay),
            error: error.to_string(),
        });

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// A [`RetryPolicy`] bundled with the observers that should see its events.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    observers: Vec<Arc<dyn RetryObserver>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        retry(&self.policy, self, label, operation).await
    }
}

impl RetryObserver for RetryExecutor {
    fn on_retry(&self, event: &RetryEvent<'_>) {
        for observer in &self.observers {
            observer.on_retry(event);
        }
    }

    fn on_exhausted(&self, event: &RetryEvent<'_>) {
        for observer in &self.observers {
            observer.on_exhausted(event);
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("observers", &self.observers.len())
            .finish()
    }
}
