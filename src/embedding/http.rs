use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{EmbeddingProvider, ModelIdentity, ProviderError};
use crate::constants::{DEFAULT_PROVIDER_BASE_URL, DEFAULT_PROVIDER_TIMEOUT};

/// Settings for [`HttpEmbeddingProvider`].
#[derive(Clone)]
pub struct HttpProviderConfig {
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,
    pub api_key: String,
    pub model: ModelIdentity,
    pub timeout: Duration,
    /// Optional `taskType` hint sent with every request.
    pub task_type: Option<String>,
    /// Ask the API to reduce vectors to `model.dimensions`.
    pub request_dimensions: bool,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            api_key: String::new(),
            model: ModelIdentity::default(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            task_type: Some("SEMANTIC_SIMILARITY".to_string()),
            request_dimensions: false,
        }
    }
}

impl std::fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("task_type", &self.task_type)
            .field("request_dimensions", &self.request_dimensions)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// [`EmbeddingProvider`] for the Gemini `batchEmbedContents` API.
#[derive(Debug)]
pub struct HttpEmbeddingProvider {
    client: Client,
    config: HttpProviderConfig,
    model_path: String,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            timeout_ms = config.timeout.as_millis() as u64,
            "HTTP embedding provider initialized"
        );

        Ok(Self {
            model_path: format!("models/{}", config.model.name),
            client,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            self.model_path
        )
    }

    fn request_body<'a>(&'a self, texts: &'a [String]) -> BatchRequest<'a> {
        let output_dimensionality = self
            .config
            .request_dimensions
            .then_some(self.config.model.dimensions);

        BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model_path,
                    content: Content {
                        parts: [Part { text }],
                    },
                    task_type: self.config.task_type.as_deref(),
                    output_dimensionality,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(texts = texts.len(), "sending batchEmbedContents request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&self.request_body(texts))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &body));
        }

        let parsed: BatchResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    reason: format!("failed to parse response body: {e}"),
                })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(ProviderError::MalformedResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            });
        }

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn model(&self) -> &ModelIdentity {
        &self.config.model
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network {
            reason: err.to_string(),
        }
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Maps a non-success HTTP status to a classified provider error.
pub(crate) fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let reason = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(512).collect()
            }
        });

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidInput { reason }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized {
            status: status.as_u16(),
            reason,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        s if s.is_client_error() => ProviderError::InvalidInput {
            reason: format!("HTTP {}: {reason}", s.as_u16()),
        },
        s => ProviderError::Upstream {
            status: s.as_u16(),
            reason,
        },
    }
}
