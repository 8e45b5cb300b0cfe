use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::RateLimitError;
use crate::retry::{Classify, FailureClass};

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,

    #[error("provider rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("upstream error (HTTP {status}): {reason}")]
    Upstream { status: u16, reason: String },

    #[error("provider rejected input: {reason}")]
    InvalidInput { reason: String },

    #[error("provider refused credentials (HTTP {status}): {reason}")]
    Unauthorized { status: u16, reason: String },

    #[error("malformed provider response: {reason}")]
    MalformedResponse { reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Classify for ProviderError {
    fn class(&self) -> FailureClass {
        match self {
            ProviderError::Timeout
            | ProviderError::RateLimited { .. }
            | ProviderError::Network { .. }
            | ProviderError::Upstream { .. }
            | ProviderError::MalformedResponse { .. } => FailureClass::Retryable,
            ProviderError::InvalidInput { .. }
            | ProviderError::Unauthorized { .. }
            | ProviderError::DimensionMismatch { .. } => FailureClass::Fatal,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Why a unit ended up without a vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedFailure {
    #[error("rate limit: {0}")]
    RateLimitTimeout(RateLimitError),

    /// The batch costs more tokens than the bucket can ever hold.
    #[error("batch of {cost} texts exceeds rate limit capacity {capacity}")]
    RateLimitCapacity { cost: u32, capacity: u32 },

    #[error("retries exhausted after {attempts} attempts: {reason}")]
    RetryExhausted { attempts: u32, reason: String },

    #[error("provider rejected input: {reason}")]
    ProviderInvalidInput { reason: String },

    #[error("provider refused request: {reason}")]
    ProviderRejected { reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("shared computation failed: {reason}")]
    CacheCoalesceFailure { reason: String },

    #[error("cancelled before the batch was issued")]
    Cancelled,

    #[error("text rejected: {reason}")]
    TextRejected { reason: String },
}

impl EmbedFailure {
    /// Stable machine-readable tag for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbedFailure::RateLimitTimeout(_) => "rate_limit_timeout",
            EmbedFailure::RateLimitCapacity { .. } => "rate_limit_capacity",
            EmbedFailure::RetryExhausted { .. } => "retry_exhausted",
            EmbedFailure::ProviderInvalidInput { .. } => "provider_invalid_input",
            EmbedFailure::ProviderRejected { .. } => "provider_rejected",
            EmbedFailure::DimensionMismatch { .. } => "dimension_mismatch",
            EmbedFailure::CacheCoalesceFailure { .. } => "cache_coalesce_failure",
            EmbedFailure::Cancelled => "cancelled",
            EmbedFailure::TextRejected { .. } => "text_rejected",
        }
    }

    /// The failure as seen by a request that attached to someone else's computation.
    pub fn coalesced(&self) -> Self {
        match self {
            EmbedFailure::CacheCoalesceFailure { .. } => self.clone(),
            other => EmbedFailure::CacheCoalesceFailure {
                reason: other.to_string(),
            },
        }
    }
}

impl From<RateLimitError> for EmbedFailure {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::CostExceedsCapacity { cost, capacity } => {
                EmbedFailure::RateLimitCapacity { cost, capacity }
            }
            timeout @ RateLimitError::Timeout { .. } => EmbedFailure::RateLimitTimeout(timeout),
        }
    }
}

impl From<ProviderError> for EmbedFailure {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidInput { reason } => EmbedFailure::ProviderInvalidInput { reason },
            ProviderError::DimensionMismatch { expected, actual } => {
                EmbedFailure::DimensionMismatch { expected, actual }
            }
            other => EmbedFailure::ProviderRejected {
                reason: other.to_string(),
            },
        }
    }
}
