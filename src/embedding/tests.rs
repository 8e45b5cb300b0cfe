use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

use super::http::status_error;
use super::*;
use crate::cancel::CancellationToken;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::retry::{Classify, FailureClass, RetryPolicy};
use crate::text::{Normalizer, Role, TextUnit};

fn units(texts: &[(&str, &str)]) -> Vec<TextUnit> {
    let normalizer = Normalizer::default();
    texts
        .iter()
        .map(|(id, text)| normalizer.unit(*id, Role::Resume, text).expect("valid text"))
        .collect()
}

fn limiter(capacity: u32) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig {
        capacity,
        period: Duration::from_secs(60),
        max_wait: Duration::from_secs(120),
    }))
}

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        jitter: false,
    }
}

fn client(provider: Arc<MockEmbeddingProvider>, batch_size: usize) -> EmbeddingClient {
    EmbeddingClient::new(
        provider,
        limiter(100),
        quick_retry(3),
        ClientConfig {
            batch_size,
            max_concurrent_batches: 2,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_embed_splits_into_batches_and_keeps_association() {
    let provider = Arc::new(MockEmbeddingProvider::new(16));
    let client = client(provider.clone(), 2);

    let input = units(&[
        ("r1", "rust tokio"),
        ("r2", "python django"),
        ("r3", "go grpc"),
        ("r4", "rust axum"),
        ("r5", "java spring"),
    ]);
    let outcome = client.embed(input.clone(), &CancellationToken::new()).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 5);
    assert_eq!(provider.call_count(), 3);
    assert!(provider.batches().iter().all(|b| b.len() <= 2));

    for unit in &input {
        let vector = &outcome.succeeded[unit.id()];
        assert_eq!(&vector.unit_id, unit.id());
        assert_eq!(vector.dimensions(), 16);
        assert_eq!(vector.fingerprint, provider.model().fingerprint(unit.text()));
    }
    assert_ne!(
        outcome.succeeded[&UnitId::from("r1")].values,
        outcome.succeeded[&UnitId::from("r2")].values
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_only_fails_its_units() {
    let provider = Arc::new(
        MockEmbeddingProvider::new(16).fail_texts_containing(
            "poison",
            ProviderError::InvalidInput {
                reason: "bad text".into(),
            },
        ),
    );
    let client = client(provider.clone(), 1);

    let outcome = client
        .embed(
            units(&[("a", "fine text"), ("b", "poison pill"), ("c", "also fine")]),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, UnitId::from("b"));
    assert!(matches!(
        outcome.failed[0].failure,
        EmbedFailure::ProviderInvalidInput { .. }
    ));
    // Fatal failures are not retried.
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_then_succeeds() {
    let provider = Arc::new(MockEmbeddingProvider::new(8).fail_next(
        2,
        ProviderError::Upstream {
            status: 503,
            reason: "unavailable".into(),
        },
    ));
    let client = client(provider.clone(), 10);

    let outcome = client
        .embed(units(&[("a", "hello world")]), &CancellationToken::new())
        .await;

    assert!(outcome.is_complete());
    assert_eq!(provider.call_count(), 3);

    let usage = client.usage().snapshot();
    assert_eq!(usage.api_calls, 3);
    assert_eq!(usage.retries, 2);
    assert_eq!(usage.texts_embedded, 1);
    assert_eq!(usage.failed_batches, 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_attempts() {
    let provider =
        Arc::new(MockEmbeddingProvider::new(8).fail_next(10, ProviderError::Timeout));
    let client = client(provider.clone(), 10);

    let outcome = client
        .embed(units(&[("a", "hello"), ("b", "world")]), &CancellationToken::new())
        .await;

    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 2);
    for failed in &outcome.failed {
        assert!(matches!(
            failed.failure,
            EmbedFailure::RetryExhausted { attempts: 3, .. }
        ));
    }

    let usage = client.usage().snapshot();
    assert_eq!(usage.failed_batches, 1);
    assert_eq!(usage.exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dimension_mismatch_is_fatal() {
    let provider = Arc::new(MockEmbeddingProvider::new(8).returning_dimensions(4));
    let client = client(provider.clone(), 10);

    let outcome = client
        .embed(units(&[("a", "hello")]), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome.failed[0].failure,
        EmbedFailure::DimensionMismatch {
            expected: 8,
            actual: 4
        }
    );
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_timeout_fails_batch() {
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        capacity: 2,
        period: Duration::from_secs(60),
        max_wait: Duration::from_secs(1),
    }));
    let client = EmbeddingClient::new(
        provider.clone(),
        limiter,
        quick_retry(3),
        ClientConfig {
            batch_size: 2,
            max_concurrent_batches: 1,
        },
    );

    let outcome = client
        .embed(
            units(&[("a", "one"), ("b", "two"), ("c", "three")]),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, UnitId::from("c"));
    assert!(matches!(
        outcome.failed[0].failure,
        EmbedFailure::RateLimitTimeout(_)
    ));
    assert_eq!(client.usage().snapshot().rate_limit_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_larger_than_bucket_is_not_a_timeout() {
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let client = EmbeddingClient::new(
        provider.clone(),
        limiter(2),
        quick_retry(3),
        ClientConfig {
            batch_size: 5,
            max_concurrent_batches: 1,
        },
    );

    let outcome = client
        .embed(
            units(&[("a", "one"), ("b", "two"), ("c", "three")]),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 3);
    for failed in &outcome.failed {
        assert_eq!(
            failed.failure,
            EmbedFailure::RateLimitCapacity {
                cost: 3,
                capacity: 2
            }
        );
        assert_eq!(failed.failure.kind(), "rate_limit_capacity");
    }
    assert_eq!(provider.call_count(), 0);
    assert_eq!(client.usage().snapshot().rate_limit_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_issues_no_batches() {
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let client = client(provider.clone(), 1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = client
        .embed(units(&[("a", "one"), ("b", "two")]), &cancel)
        .await;

    assert!(outcome.succeeded.is_empty());
    assert!(
        outcome
            .failed
            .iter()
            .all(|f| f.failure == EmbedFailure::Cancelled)
    );
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let client = client(provider.clone(), 4);

    let outcome = client.embed(Vec::new(), &CancellationToken::new()).await;

    assert!(outcome.succeeded.is_empty() && outcome.failed.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_status_mapping() {
    assert_eq!(
        status_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            ""
        ),
        ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );

    let body = r#"{"error":{"code":400,"message":"text too long","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(
        status_error(StatusCode::BAD_REQUEST, None, body),
        ProviderError::InvalidInput {
            reason: "text too long".into()
        }
    );

    assert!(matches!(
        status_error(StatusCode::FORBIDDEN, None, "nope"),
        ProviderError::Unauthorized { status: 403, .. }
    ));
    assert!(matches!(
        status_error(StatusCode::BAD_GATEWAY, None, ""),
        ProviderError::Upstream { status: 502, .. }
    ));
    assert!(matches!(
        status_error(StatusCode::NOT_FOUND, None, ""),
        ProviderError::InvalidInput { .. }
    ));
}

#[test]
fn test_provider_error_classes() {
    assert_eq!(ProviderError::Timeout.class(), FailureClass::Retryable);
    assert_eq!(
        ProviderError::MalformedResponse {
            reason: String::new()
        }
        .class(),
        FailureClass::Retryable
    );
    assert_eq!(
        ProviderError::Unauthorized {
            status: 401,
            reason: String::new()
        }
        .class(),
        FailureClass::Fatal
    );
    assert_eq!(
        ProviderError::DimensionMismatch {
            expected: 1,
            actual: 2
        }
        .class(),
        FailureClass::Fatal
    );
}

#[test]
fn test_coalesced_failure_wraps_reason_once() {
    let original = EmbedFailure::ProviderInvalidInput {
        reason: "bad".into(),
    };
    let coalesced = original.coalesced();

    assert_eq!(coalesced.kind(), "cache_coalesce_failure");
    assert!(coalesced.to_string().contains("bad"));
    assert_eq!(coalesced.coalesced(), coalesced);
}

#[test]
fn test_usage_snapshot_and_reset() {
    let usage = EmbeddingUsage::new();
    usage.record_call(Duration::from_millis(30));
    usage.record_call(Duration::from_millis(10));
    usage.record_embedded(5);

    let snapshot = usage.snapshot();
    assert_eq!(snapshot.api_calls, 2);
    assert_eq!(snapshot.texts_embedded, 5);
    assert_eq!(snapshot.total_latency_ms, 40);
    assert!((snapshot.average_latency_ms() - 20.0).abs() < f64::EPSILON);

    usage.reset();
    assert_eq!(usage.snapshot(), UsageSnapshot::default());
}

#[test]
fn test_model_identity_fingerprint_depends_on_version() {
    let v1 = ModelIdentity::new("m", "v1", 4);
    let v2 = ModelIdentity::new("m", "v2", 4);

    assert_eq!(v1.fingerprint("text"), v1.fingerprint("text"));
    assert_ne!(v1.fingerprint("text"), v2.fingerprint("text"));
}

#[test]
fn test_http_provider_config_debug_redacts_key() {
    let config = HttpProviderConfig {
        api_key: "secret-key".into(),
        ..HttpProviderConfig::default()
    };

    let rendered = format!("{config:?}");
    assert!(!rendered.contains("secret-key"));
    assert!(rendered.contains("<redacted>"));
}
