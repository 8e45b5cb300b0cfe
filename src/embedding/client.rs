use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{
    EmbedFailure, EmbeddingProvider, EmbeddingUsage, EmbeddingVector, ModelIdentity,
    ProviderError, UsageRetryObserver,
};
use crate::cancel::CancellationToken;
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONCURRENT_BATCHES};
use crate::ratelimit::{RateLimitError, RateLimiter};
use crate::retry::{
    Classify, FailureClass, RetryError, RetryExecutor, RetryPolicy, TracingRetryObserver,
};
use crate::text::{TextUnit, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Max texts per provider call.
    pub batch_size: usize,
    /// Max provider calls in flight for one `embed` call.
    pub max_concurrent_batches: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub id: UnitId,
    pub failure: EmbedFailure,
}

/// Per-unit result of [`EmbeddingClient::embed`]. Never all-or-nothing.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub succeeded: HashMap<UnitId, EmbeddingVector>,
    pub failed: Vec<UnitFailure>,
}

impl EmbedOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail_all(&mut self, units: &[TextUnit], failure: &EmbedFailure) {
        self.failed.extend(units.iter().map(|unit| UnitFailure {
            id: unit.id().clone(),
            failure: failure.clone(),
        }));
    }
}

/// One attempt either could not get rate budget or the provider call failed.
#[derive(Debug)]
enum AttemptError {
    RateLimit(RateLimitError),
    Provider(ProviderError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::RateLimit(e) => e.fmt(f),
            AttemptError::Provider(e) => e.fmt(f),
        }
    }
}

impl Classify for AttemptError {
    fn class(&self) -> FailureClass {
        match self {
            // The limiter already waited max_wait.
            AttemptError::RateLimit(_) => FailureClass::Fatal,
            AttemptError::Provider(e) => e.class(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptError::RateLimit(_) => None,
            AttemptError::Provider(e) => e.retry_after(),
        }
    }
}

fn into_failure(err: RetryError<AttemptError>) -> EmbedFailure {
    match err {
        RetryError::Fatal {
            error: AttemptError::RateLimit(e),
            ..
        }
        | RetryError::Exhausted {
            last: AttemptError::RateLimit(e),
            ..
        } => e.into(),
        RetryError::Fatal {
            error: AttemptError::Provider(e),
            ..
        } => e.into(),
        RetryError::Exhausted {
            attempts,
            last: AttemptError::Provider(e),
        } => EmbedFailure::RetryExhausted {
            attempts,
            reason: e.to_string(),
        },
    }
}

fn check_shape(vectors: &[Vec<f32>], expected_count: usize, dims: usize) -> Result<(), ProviderError> {
    if vectors.len() != expected_count {
        return Err(ProviderError::MalformedResponse {
            reason: format!("expected {} vectors, got {}", expected_count, vectors.len()),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(ProviderError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Batches units through a rate-limited, retried provider.
///
/// Every batch spends `batch.len()` tokens from the shared [`RateLimiter`] before each
/// provider attempt. A batch that still fails after retries fails only its own units.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    config: ClientConfig,
    usage: Arc<EmbeddingUsage>,
}

impl fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider)
            .field("model", self.provider.model())
            .field("retry", &self.retry)
            .field("config", &self.config)
            .finish()
    }
}

impl EmbeddingClient {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        config: ClientConfig,
    ) -> Self {
        let usage = Arc::new(EmbeddingUsage::new());
        let retry = RetryExecutor::new(policy)
            .with_observer(Arc::new(TracingRetryObserver))
            .with_observer(Arc::new(UsageRetryObserver::new(Arc::clone(&usage))));

        Self {
            provider,
            limiter,
            retry,
            config,
            usage,
        }
    }

    pub fn model(&self) -> &ModelIdentity {
        self.provider.model()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn usage(&self) -> &Arc<EmbeddingUsage> {
        &self.usage
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Embeds `units`, reporting each one as succeeded or failed.
    ///
    /// Once `cancel` is observed no further batch is issued; the units of unissued
    /// batches fail with [`EmbedFailure::Cancelled`].
    #[instrument(skip(self, units, cancel), fields(units = units.len(), model = %self.model().name))]
    pub async fn embed(&self, units: Vec<TextUnit>, cancel: &CancellationToken) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();
        if units.is_empty() {
            return outcome;
        }

        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<TextUnit>> = units.chunks(batch_size).map(<[TextUnit]>::to_vec).collect();
        let batch_count = batches.len();

        let results: Vec<(Vec<TextUnit>, Result<Vec<Vec<f32>>, EmbedFailure>)> =
            stream::iter(batches.into_iter().enumerate())
                .map(|(index, batch)| async move {
                    if cancel.is_cancelled() {
                        debug!(batch = index, "cancelled before issue");
                        return (batch, Err(EmbedFailure::Cancelled));
                    }
                    let result = self.embed_batch(index, &batch).await;
                    (batch, result)
                })
                .buffer_unordered(self.config.max_concurrent_batches.max(1))
                .collect()
                .await;

        let model = self.model();
        for (batch, result) in results {
            match result {
                Ok(vectors) => {
                    for (unit, values) in batch.iter().zip(vectors) {
                        outcome
                            .succeeded
                            .insert(unit.id().clone(), EmbeddingVector::new(unit, values, model));
                    }
                }
                Err(failure) => outcome.fail_all(&batch, &failure),
            }
        }

        info!(
            batches = batch_count,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "embedding request finished"
        );
        outcome
    }

    /// Embeds a single unit.
    pub async fn embed_one(
        &self,
        unit: TextUnit,
        cancel: &CancellationToken,
    ) -> Result<EmbeddingVector, EmbedFailure> {
        let id = unit.id().clone();
        let mut outcome = self.embed(vec![unit], cancel).await;
        if let Some(vector) = outcome.succeeded.remove(&id) {
            return Ok(vector);
        }
        Err(outcome
            .failed
            .pop()
            .map(|f| f.failure)
            .unwrap_or(EmbedFailure::Cancelled))
    }

    async fn embed_batch(
        &self,
        index: usize,
        batch: &[TextUnit],
    ) -> Result<Vec<Vec<f32>>, EmbedFailure> {
        let texts: Vec<String> = batch.iter().map(|unit| unit.text().to_string()).collect();
        let texts = texts.as_slice();
        let cost = u32::try_from(batch.len()).unwrap_or(u32::MAX);
        let dims = self.model().dimensions;

        let result = self
            .retry
            .execute("embed_batch", move |attempt| async move {
                let waited = self
                    .limiter
                    .acquire(cost)
                    .await
                    .map_err(AttemptError::RateLimit)?;
                if !waited.is_zero() {
                    debug!(batch = index, attempt, waited_ms = waited.as_millis() as u64, "rate budget acquired");
                }

                let started = Instant::now();
                let result = self.provider.embed_batch(texts).await;
                self.usage.record_call(started.elapsed());

                let vectors = result.map_err(AttemptError::Provider)?;
                check_shape(&vectors, texts.len(), dims).map_err(AttemptError::Provider)?;
                Ok(vectors)
            })
            .await;

        match result {
            Ok(vectors) => {
                self.usage.record_embedded(vectors.len());
                debug!(batch = index, size = vectors.len(), "batch embedded");
                Ok(vectors)
            }
            Err(err) => {
                let failure = into_failure(err);
                self.usage.record_failed_batch();
                if matches!(failure, EmbedFailure::RateLimitTimeout(_)) {
                    self.usage.record_rate_limit_timeout();
                }
                warn!(batch = index, size = batch.len(), kind = failure.kind(), error = %failure, "embedding batch failed");
                Err(failure)
            }
        }
    }
}
