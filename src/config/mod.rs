//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `EMBEDMATCH_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_BASE_BACKOFF, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL,
    DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_CONCURRENT_BATCHES, DEFAULT_MAX_TEXT_CHARS, DEFAULT_MODEL_NAME,
    DEFAULT_MODEL_VERSION, DEFAULT_PROVIDER_BASE_URL, DEFAULT_PROVIDER_TIMEOUT,
    DEFAULT_RATE_MAX_WAIT, DEFAULT_RATE_PERIOD, DEFAULT_REQUESTS_PER_PERIOD, DEFAULT_TOP_K,
};
use crate::embedding::{ClientConfig, HttpProviderConfig, ModelIdentity};
use crate::ratelimit::RateLimitConfig;
use crate::retry::RetryPolicy;
use crate::text::{NormalizerConfig, OversizePolicy};

/// Engine configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `EMBEDMATCH_*` overrides on top of defaults, then
/// [`Config::validate`] before building anything from it.
#[derive(Clone)]
pub struct Config {
    /// Provider API key. Required by the HTTP provider only.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub model_version: String,
    pub dimensions: usize,
    /// Ask the provider to reduce vectors to `dimensions`. Default: `false`.
    pub request_dimensions: bool,
    pub provider_timeout: Duration,

    pub batch_size: usize,
    pub max_concurrent_batches: usize,

    /// Token bucket capacity, in texts per `rate_period`.
    pub rate_capacity: u32,
    pub rate_period: Duration,
    pub rate_max_wait: Duration,

    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,

    pub cache_capacity: u64,
    /// `None` keeps entries until evicted by capacity.
    pub cache_ttl: Option<Duration>,

    pub max_text_chars: usize,
    pub oversize: OversizePolicy,

    pub top_k: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("model_version", &self.model_version)
            .field("dimensions", &self.dimensions)
            .field("request_dimensions", &self.request_dimensions)
            .field("provider_timeout", &self.provider_timeout)
            .field("batch_size", &self.batch_size)
            .field("max_concurrent_batches", &self.max_concurrent_batches)
            .field("rate_capacity", &self.rate_capacity)
            .field("rate_period", &self.rate_period)
            .field("rate_max_wait", &self.rate_max_wait)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl", &self.cache_ttl)
            .field("max_text_chars", &self.max_text_chars)
            .field("oversize", &self.oversize)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIM,
            request_dimensions: false,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            rate_capacity: DEFAULT_REQUESTS_PER_PERIOD,
            rate_period: DEFAULT_RATE_PERIOD,
            rate_max_wait: DEFAULT_RATE_MAX_WAIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_BACKOFF,
            max_delay: DEFAULT_MAX_BACKOFF,
            jitter: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Some(DEFAULT_CACHE_TTL),
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            oversize: OversizePolicy::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Config {
    const ENV_API_KEY: &'static str = "EMBEDMATCH_API_KEY";
    const ENV_BASE_URL: &'static str = "EMBEDMATCH_BASE_URL";
    const ENV_MODEL_NAME: &'static str = "EMBEDMATCH_MODEL";
    const ENV_MODEL_VERSION: &'static str = "EMBEDMATCH_MODEL_VERSION";
    const ENV_DIMENSIONS: &'static str = "EMBEDMATCH_DIMENSIONS";
    const ENV_REQUEST_DIMENSIONS: &'static str = "EMBEDMATCH_REQUEST_DIMENSIONS";
    const ENV_PROVIDER_TIMEOUT_SECS: &'static str = "EMBEDMATCH_PROVIDER_TIMEOUT_SECS";
    const ENV_BATCH_SIZE: &'static str = "EMBEDMATCH_BATCH_SIZE";
    const ENV_MAX_CONCURRENT_BATCHES: &'static str = "EMBEDMATCH_MAX_CONCURRENT_BATCHES";
    const ENV_RATE_CAPACITY: &'static str = "EMBEDMATCH_RATE_CAPACITY";
    const ENV_RATE_PERIOD_SECS: &'static str = "EMBEDMATCH_RATE_PERIOD_SECS";
    const ENV_RATE_MAX_WAIT_MS: &'static str = "EMBEDMATCH_RATE_MAX_WAIT_MS";
    const ENV_MAX_ATTEMPTS: &'static str = "EMBEDMATCH_MAX_ATTEMPTS";
    const ENV_BASE_DELAY_MS: &'static str = "EMBEDMATCH_BASE_DELAY_MS";
    const ENV_MAX_DELAY_MS: &'static str = "EMBEDMATCH_MAX_DELAY_MS";
    const ENV_JITTER: &'static str = "EMBEDMATCH_JITTER";
    const ENV_CACHE_CAPACITY: &'static str = "EMBEDMATCH_CACHE_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "EMBEDMATCH_CACHE_TTL_SECS";
    const ENV_MAX_TEXT_CHARS: &'static str = "EMBEDMATCH_MAX_TEXT_CHARS";
    const ENV_OVERSIZE: &'static str = "EMBEDMATCH_OVERSIZE";
    const ENV_TOP_K: &'static str = "EMBEDMATCH_TOP_K";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_ttl = match Self::parse_from_env::<u64>(Self::ENV_CACHE_TTL_SECS)? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.cache_ttl,
        };

        Ok(Self {
            api_key: Self::parse_optional_string_from_env(Self::ENV_API_KEY),
            base_url: Self::parse_optional_string_from_env(Self::ENV_BASE_URL)
                .unwrap_or(defaults.base_url),
            model_name: Self::parse_optional_string_from_env(Self::ENV_MODEL_NAME)
                .unwrap_or(defaults.model_name),
            model_version: Self::parse_optional_string_from_env(Self::ENV_MODEL_VERSION)
                .unwrap_or(defaults.model_version),
            dimensions: Self::parse_from_env(Self::ENV_DIMENSIONS)?.unwrap_or(defaults.dimensions),
            request_dimensions: Self::parse_bool_from_env(Self::ENV_REQUEST_DIMENSIONS)?
                .unwrap_or(defaults.request_dimensions),
            provider_timeout: Self::parse_from_env(Self::ENV_PROVIDER_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            batch_size: Self::parse_from_env(Self::ENV_BATCH_SIZE)?.unwrap_or(defaults.batch_size),
            max_concurrent_batches: Self::parse_from_env(Self::ENV_MAX_CONCURRENT_BATCHES)?
                .unwrap_or(defaults.max_concurrent_batches),
            rate_capacity: Self::parse_from_env(Self::ENV_RATE_CAPACITY)?
                .unwrap_or(defaults.rate_capacity),
            rate_period: Self::parse_from_env(Self::ENV_RATE_PERIOD_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_period),
            rate_max_wait: Self::parse_from_env(Self::ENV_RATE_MAX_WAIT_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_max_wait),
            max_attempts: Self::parse_from_env(Self::ENV_MAX_ATTEMPTS)?
                .unwrap_or(defaults.max_attempts),
            base_delay: Self::parse_from_env(Self::ENV_BASE_DELAY_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: Self::parse_from_env(Self::ENV_MAX_DELAY_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            jitter: Self::parse_bool_from_env(Self::ENV_JITTER)?.unwrap_or(defaults.jitter),
            cache_capacity: Self::parse_from_env(Self::ENV_CACHE_CAPACITY)?
                .unwrap_or(defaults.cache_capacity),
            cache_ttl,
            max_text_chars: Self::parse_from_env(Self::ENV_MAX_TEXT_CHARS)?
                .unwrap_or(defaults.max_text_chars),
            oversize: Self::parse_from_env(Self::ENV_OVERSIZE)?.unwrap_or(defaults.oversize),
            top_k: Self::parse_from_env(Self::ENV_TOP_K)?.unwrap_or(defaults.top_k),
        })
    }

    /// Checks cross-field invariants. Does not check the API key; see [`Config::api_key`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.dimensions == 0 {
            return Err(invalid("dimensions", "must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0"));
        }
        if self.max_concurrent_batches == 0 {
            return Err(invalid("max_concurrent_batches", "must be greater than 0"));
        }
        if (self.rate_capacity as usize) < self.batch_size {
            return Err(invalid(
                "rate_capacity",
                format!(
                    "({}) must be at least batch_size ({})",
                    self.rate_capacity, self.batch_size
                ),
            ));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.base_delay > self.max_delay {
            return Err(invalid(
                "base_delay",
                format!(
                    "({:?}) must not exceed max_delay ({:?})",
                    self.base_delay, self.max_delay
                ),
            ));
        }
        if self.max_text_chars == 0 {
            return Err(invalid("max_text_chars", "must be greater than 0"));
        }
        self.cache_config()
            .validate()
            .map_err(|e| invalid("cache", e.to_string()))?;

        Ok(())
    }

    /// The API key, or [`ConfigError::MissingEnvVar`] when unset.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingEnvVar {
                name: Self::ENV_API_KEY,
            })
    }

    pub fn model(&self) -> ModelIdentity {
        ModelIdentity::new(&self.model_name, &self.model_version, self.dimensions)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            capacity: self.rate_capacity,
            period: self.rate_period,
            max_wait: self.rate_max_wait,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            batch_size: self.batch_size,
            max_concurrent_batches: self.max_concurrent_batches,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: self.cache_ttl,
        }
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            max_chars: self.max_text_chars,
            oversize: self.oversize,
        }
    }

    /// Provider settings. Fails when no API key is configured.
    pub fn provider_config(&self) -> Result<HttpProviderConfig, ConfigError> {
        Ok(HttpProviderConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key()?.to_string(),
            model: self.model(),
            timeout: self.provider_timeout,
            request_dimensions: self.request_dimensions,
            ..HttpProviderConfig::default()
        })
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_from_env<T>(var_name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    reason: e.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    fn parse_bool_from_env(var_name: &'static str) -> Result<Option<bool>, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidValue {
                    name: var_name,
                    value,
                    reason: "expected a boolean".to_string(),
                }),
            },
            None => Ok(None),
        }
    }
}
