//! Cross-cutting, shared defaults.
//!
//! Every value here is a default for a field of [`crate::config::Config`]; the
//! runtime value always comes from configuration.

use std::time::Duration;

/// Default embedding model name (Gemini text embeddings).
pub const DEFAULT_MODEL_NAME: &str = "text-embedding-004";
/// Default embedding model version tag, folded into every fingerprint.
pub const DEFAULT_MODEL_VERSION: &str = "v1beta";
/// Default provider output dimensionality.
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Max texts per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Max batches of one request in flight at once.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

/// Tokens granted per refill period.
pub const DEFAULT_REQUESTS_PER_PERIOD: u32 = 1_500;
pub const DEFAULT_RATE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_MAX_WAIT: Duration = Duration::from_secs(10);

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
/// Cached vectors expire after 30 days unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Max characters of normalized text sent to the provider.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 8_000;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of results returned when a caller does not ask for a specific `top_k`.
pub const DEFAULT_TOP_K: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds_are_ordered() {
        assert!(DEFAULT_BASE_BACKOFF <= DEFAULT_MAX_BACKOFF);
    }

    #[test]
    fn test_batch_fits_in_rate_budget() {
        assert!(DEFAULT_BATCH_SIZE as u32 <= DEFAULT_REQUESTS_PER_PERIOD);
    }
}
