//! Embedding acquisition.
//!
//! - [`EmbeddingProvider`] is the outbound seam: one batched call per request.
//! - [`EmbeddingClient`] batches units, spends rate budget, retries transient failures
//!   and reports per-unit outcomes.
//! - [`HttpEmbeddingProvider`] talks to a Gemini-style `batchEmbedContents` endpoint.
//! - [`EmbeddingUsage`] counts calls, texts, failures and latency.

mod client;
mod error;
/// Gemini-style HTTP provider.
pub mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod usage;

#[cfg(test)]
mod tests;

pub use client::{ClientConfig, EmbedOutcome, EmbeddingClient, UnitFailure};
pub use error::{EmbedFailure, ProviderError};
pub use http::{HttpEmbeddingProvider, HttpProviderConfig};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbeddingProvider;
pub use usage::{EmbeddingUsage, UsageRetryObserver, UsageSnapshot};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_NAME, DEFAULT_MODEL_VERSION};
use crate::hashing::{Fingerprint, fingerprint};
use crate::text::{TextUnit, UnitId};

/// Name, version and output dimensionality of an embedding model.
///
/// Vectors are only comparable when their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelIdentity {
    pub name: String,
    pub version: String,
    pub dimensions: usize,
}

impl ModelIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dimensions,
        }
    }

    /// Cache key for `text` under this model.
    #[inline]
    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        fingerprint(&self.name, &self.version, text)
    }
}

impl Default for ModelIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_NAME, DEFAULT_MODEL_VERSION, DEFAULT_EMBEDDING_DIM)
    }
}

impl std::fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({}d)", self.name, self.version, self.dimensions)
    }
}

/// A vector produced by a provider for one unit's normalized text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingVector {
    pub unit_id: UnitId,
    pub values: Vec<f32>,
    pub fingerprint: Fingerprint,
    pub model: ModelIdentity,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingVector {
    pub fn new(unit: &TextUnit, values: Vec<f32>, model: &ModelIdentity) -> Self {
        Self {
            unit_id: unit.id().clone(),
            fingerprint: model.fingerprint(unit.text()),
            values,
            model: model.clone(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }
}

/// Remote embedding model.
///
/// Implementations return exactly one vector per input text, in input order. The
/// client validates both count and dimensionality.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Embeds a batch of already-normalized texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Identity of the model behind this provider.
    fn model(&self) -> &ModelIdentity;
}
