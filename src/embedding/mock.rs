//! In-memory provider for tests and local runs.
//!
//! Vectors are lexical: every distinct lowercase word gets its own dimension (modulo
//! the configured dimensionality) and a text's vector counts its words. Cosine
//! similarity between two mock vectors therefore tracks word overlap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{EmbeddingProvider, ModelIdentity, ProviderError};

#[derive(Debug, Clone)]
struct MarkerFailure {
    marker: String,
    error: ProviderError,
}

#[derive(Debug, Default)]
struct Script {
    fail_next: Vec<ProviderError>,
    fail_on_marker: Vec<MarkerFailure>,
    override_dimensions: Option<usize>,
    latency: Option<Duration>,
}

/// Deterministic, call-counting [`EmbeddingProvider`].
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    model: ModelIdentity,
    vocabulary: Mutex<HashMap<String, usize>>,
    script: Mutex<Script>,
    calls: AtomicUsize,
    texts: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self::with_model(ModelIdentity::new("mock-embedding", "v1", dimensions))
    }

    pub fn with_model(model: ModelIdentity) -> Self {
        Self {
            model,
            vocabulary: Mutex::new(HashMap::new()),
            script: Mutex::new(Script::default()),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Every call whose batch contains a text with `marker` fails with `error`.
    pub fn fail_texts_containing(self, marker: impl Into<String>, error: ProviderError) -> Self {
        self.script.lock().fail_on_marker.push(MarkerFailure {
            marker: marker.into(),
            error,
        });
        self
    }

    /// The next `times` calls fail with `error`, then calls succeed again.
    pub fn fail_next(self, times: usize, error: ProviderError) -> Self {
        self.script
            .lock()
            .fail_next
            .extend(std::iter::repeat_n(error, times));
        self
    }

    /// Returns vectors of `dimensions` components regardless of the declared model.
    pub fn returning_dimensions(self, dimensions: usize) -> Self {
        self.script.lock().override_dimensions = Some(dimensions);
        self
    }

    /// Sleeps for `latency` inside every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script.lock().latency = Some(latency);
        self
    }

    /// Number of `embed_batch` calls, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts in successful calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    /// Every batch received, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    fn vectorize(&self, text: &str, dimensions: usize) -> Vec<f32> {
        let mut values = vec![0.0f32; dimensions];
        if dimensions == 0 {
            return values;
        }

        let mut vocabulary = self.vocabulary.lock();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let next = vocabulary.len();
            let slot = *vocabulary.entry(word.to_lowercase()).or_insert(next);
            values[slot % dimensions] += 1.0;
        }
        values
    }

    fn scripted_failure(&self, texts: &[String]) -> Option<ProviderError> {
        let mut script = self.script.lock();
        if !script.fail_next.is_empty() {
            return Some(script.fail_next.remove(0));
        }
        script
            .fail_on_marker
            .iter()
            .find(|f| texts.iter().any(|t| t.contains(&f.marker)))
            .map(|f| f.error.clone())
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().push(texts.to_vec());

        let latency = self.script.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.scripted_failure(texts) {
            return Err(error);
        }

        let dimensions = self
            .script
            .lock()
            .override_dimensions
            .unwrap_or(self.model.dimensions);

        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| self.vectorize(text, dimensions))
            .collect())
    }

    fn model(&self) -> &ModelIdentity {
        &self.model
    }
}
