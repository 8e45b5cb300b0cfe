use std::time::Duration;

use tracing::{error, warn};

/// One retry or exhaustion, as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent<'a> {
    pub label: &'a str,
    /// Attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    /// Sleep before the next attempt; `None` on exhaustion.
    pub delay: Option<Duration>,
    pub error: String,
}

/// Hooks called by the retry loop.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, _event: &RetryEvent<'_>) {}

    fn on_exhausted(&self, _event: &RetryEvent<'_>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRetryObserver;

impl RetryObserver for NoopRetryObserver {}

/// Logs retries at `warn` and exhaustion at `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, event: &RetryEvent<'_>) {
        warn!(
            operation = event.label,
            attempt = event.attempt,
            max_attempts = event.max_attempts,
            delay_ms = event.delay.map(|d| d.as_millis() as u64),
            error = %event.error,
            "retrying after transient failure"
        );
    }

    fn on_exhausted(&self, event: &RetryEvent<'_>) {
        error!(
            operation = event.label,
            attempts = event.attempt,
            error = %event.error,
            "retries exhausted"
        );
    }
}
