use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::retry::{RetryEvent, RetryObserver};

/// Running counters for provider usage.
#[derive(Debug, Default)]
pub struct EmbeddingUsage {
    api_calls: AtomicU64,
    texts_embedded: AtomicU64,
    failed_batches: AtomicU64,
    retries: AtomicU64,
    exhausted: AtomicU64,
    rate_limit_timeouts: AtomicU64,
    latency_micros: AtomicU64,
}

/// Point-in-time copy of [`EmbeddingUsage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub api_calls: u64,
    pub texts_embedded: u64,
    pub failed_batches: u64,
    pub retries: u64,
    pub exhausted: u64,
    pub rate_limit_timeouts: u64,
    pub total_latency_ms: u64,
}

impl UsageSnapshot {
    /// Mean provider latency per call in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.api_calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.api_calls as f64
        }
    }
}

impl EmbeddingUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, latency: Duration) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_embedded(&self, texts: usize) {
        self.texts_embedded
            .fetch_add(texts as u64, Ordering::Relaxed);
    }

    pub fn record_failed_batch(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_timeout(&self) {
        self.rate_limit_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            texts_embedded: self.texts_embedded.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            rate_limit_timeouts: self.rate_limit_timeouts.load(Ordering::Relaxed),
            total_latency_ms: self.latency_micros.load(Ordering::Relaxed) / 1_000,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.api_calls,
            &self.texts_embedded,
            &self.failed_batches,
            &self.retries,
            &self.exhausted,
            &self.rate_limit_timeouts,
            &self.latency_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Feeds retry events into an [`EmbeddingUsage`].
#[derive(Debug, Clone)]
pub struct UsageRetryObserver {
    usage: Arc<EmbeddingUsage>,
}

impl UsageRetryObserver {
    pub fn new(usage: Arc<EmbeddingUsage>) -> Self {
        Self { usage }
    }
}

impl RetryObserver for UsageRetryObserver {
    fn on_retry(&self, _event: &RetryEvent<'_>) {
        self.usage.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_exhausted(&self, _event: &RetryEvent<'_>) {
        self.usage.exhausted.fetch_add(1, Ordering::Relaxed);
    }
}
