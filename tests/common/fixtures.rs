//! Test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use embedmatch::{
    CacheConfig, ClientConfig, EmbeddingClient, MatchInput, MatchingOrchestrator,
    MockEmbeddingProvider, Normalizer, RateLimitConfig, RateLimiter, RetryPolicy,
};

pub const MOCK_DIMENSIONS: usize = 64;

/// Appears only in the text of resume `R2`.
pub const R2_MARKER: &str = "Pastry";

/// The reference job and three resumes. Lexical overlap with the job orders them R1, R3, R2.
pub fn job() -> MatchInput {
    MatchInput::new("J", "Senior Rust backend engineer: tokio, async, distributed systems")
}

pub fn resumes() -> Vec<MatchInput> {
    vec![
        MatchInput::new(
            "R1",
            "Rust backend engineer with tokio and async distributed systems experience",
        ),
        MatchInput::new("R2", "Pastry chef, French desserts and bakery management"),
        MatchInput::new("R3", "Junior Python developer, some Rust"),
    ]
}

/// An orchestrator wired to a [`MockEmbeddingProvider`].
pub struct Engine {
    pub provider: Arc<MockEmbeddingProvider>,
    pub client: Arc<EmbeddingClient>,
    pub orchestrator: MatchingOrchestrator,
}

pub struct EngineBuilder {
    provider: MockEmbeddingProvider,
    client: ClientConfig,
    rate: RateLimitConfig,
    retry: RetryPolicy,
    cache: CacheConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            provider: MockEmbeddingProvider::new(MOCK_DIMENSIONS),
            client: ClientConfig::default(),
            rate: RateLimitConfig::default(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(500),
                jitter: false,
            },
            cache: CacheConfig::default(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: MockEmbeddingProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.client.batch_size = batch_size;
        self
    }

    pub fn rate_limit(mut self, capacity: u32, period: Duration, max_wait: Duration) -> Self {
        self.rate = RateLimitConfig {
            capacity,
            period,
            max_wait,
        };
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    pub fn build(self) -> Engine {
        let provider = Arc::new(self.provider);
        let client = Arc::new(EmbeddingClient::new(
            provider.clone(),
            Arc::new(RateLimiter::new(self.rate)),
            self.retry,
            self.client,
        ));
        let orchestrator =
            MatchingOrchestrator::new(Arc::clone(&client), Normalizer::default(), self.cache)
                .expect("valid cache config");
        Engine {
            provider,
            client,
            orchestrator,
        }
    }
}
