//! Embedmatch library crate (used by the binary and integration tests).
//!
//! Turns resume and job texts into embedding vectors through a rate-limited, retried,
//! batched provider client, caches vectors by content fingerprint with coalescing of
//! concurrent requests, and ranks candidates by cosine similarity.
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`MatchingOrchestrator`] - normalize, embed through the cache, rank
//! - [`EmbeddingClient`] - batching, rate budget, retry, partial outcomes
//! - [`EmbeddingCache`] - fingerprint-keyed LRU cache with request coalescing
//! - [`SimilarityEngine`] - cosine scoring and top-k ranking
//!
//! ## Building Blocks
//! - [`RateLimiter`] - async token bucket
//! - [`RetryExecutor`], [`RetryPolicy`] - classified retry with backoff
//! - [`Normalizer`], [`ResumeProfile`], [`JobProfile`] - text preparation
//! - [`HttpEmbeddingProvider`] - `batchEmbedContents` provider
//!
//! ## Test/Mock Support
//! [`MockEmbeddingProvider`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod hashing;
pub mod matching;
pub mod ratelimit;
pub mod retry;
pub mod scoring;
pub mod text;

pub use cache::{CacheConfig, CacheError, CacheResult, CacheStats, EmbeddingCache, Resolved};
pub use cancel::CancellationToken;
pub use config::{Config, ConfigError};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbeddingProvider;
pub use embedding::{
    ClientConfig, EmbedFailure, EmbedOutcome, EmbeddingClient, EmbeddingProvider,
    EmbeddingUsage, EmbeddingVector, HttpEmbeddingProvider, HttpProviderConfig, ModelIdentity,
    ProviderError, UnitFailure, UsageSnapshot,
};
pub use hashing::{Fingerprint, fingerprint};
pub use matching::{
    Exclusion, MatchError, MatchInput, MatchPhase, MatchReport, MatchRequest, MatchStatus,
    MatchSubject, MatchingOrchestrator,
};
pub use ratelimit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimiter};
pub use retry::{
    Classify, FailureClass, RetryError, RetryEvent, RetryExecutor, RetryObserver, RetryPolicy,
    TracingRetryObserver,
};
pub use scoring::{
    MatchResult, Query, SimilarityEngine, SimilarityError, SimilarityResult, cosine_similarity,
};
pub use text::{
    JobProfile, Normalizer, NormalizerConfig, OversizePolicy, ResumeProfile, Role, TextError,
    TextUnit, UnitId,
};
