use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::cache::CacheConfig;
use crate::cancel::CancellationToken;
use crate::embedding::{ClientConfig, EmbeddingClient, MockEmbeddingProvider, ProviderError};
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::retry::RetryPolicy;
use crate::text::{Normalizer, Role, UnitId};

fn orchestrator(
    provider: MockEmbeddingProvider,
    batch_size: usize,
) -> (Arc<MockEmbeddingProvider>, MatchingOrchestrator) {
    let provider = Arc::new(provider);
    let client = Arc::new(EmbeddingClient::new(
        provider.clone(),
        Arc::new(RateLimiter::new(RateLimitConfig::default())),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter: false,
        },
        ClientConfig {
            batch_size,
            max_concurrent_batches: 2,
        },
    ));
    let orchestrator =
        MatchingOrchestrator::new(client, Normalizer::default(), CacheConfig::default())
            .expect("valid cache config");
    (provider, orchestrator)
}

fn ids(report: &MatchReport, role: Role) -> Vec<&str> {
    report
        .results
        .iter()
        .map(|r| match role {
            Role::Job => r.resume_id.as_str(),
            Role::Resume => r.job_id.as_str(),
        })
        .collect()
}

#[tokio::test]
async fn test_resume_to_jobs_fills_ids_by_role() {
    let (_provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(64), 10);

    let report = orchestrator
        .match_resume_to_jobs(
            MatchInput::new("resume-1", "kotlin android mobile developer"),
            vec![
                MatchInput::new("job-a", "backend java developer"),
                MatchInput::new("job-b", "kotlin android mobile engineer"),
            ],
            10,
            &CancellationToken::new(),
        )
        .await
        .expect("ranked");

    assert_eq!(report.status, MatchStatus::Complete);
    assert_eq!(report.query_role, Role::Resume);
    assert_eq!(ids(&report, Role::Resume), ["job-b", "job-a"]);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.resume_id == UnitId::from("resume-1"))
    );
}

#[tokio::test]
async fn test_duplicate_and_empty_candidates_are_excluded() {
    let (_provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(64), 10);

    let report = orchestrator
        .match_job_to_resumes(
            MatchInput::new("job", "rust engineer"),
            vec![
                MatchInput::new("r1", "rust engineer"),
                MatchInput::new("r2", "   \n\t "),
                MatchInput::new("r1", "another rust engineer"),
            ],
            10,
            &CancellationToken::new(),
        )
        .await
        .expect("ranked");

    assert_eq!(report.status, MatchStatus::Partial);
    assert_eq!(report.candidates, 3);
    assert_eq!(ids(&report, Role::Job), ["r1"]);
    assert_eq!(
        report
            .excluded
            .iter()
            .map(|e| (e.id.as_str(), e.kind.as_str()))
            .collect::<Vec<_>>(),
        [("r2", "text_rejected"), ("r1", "duplicate_id")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_candidate_batch_makes_request_partial() {
    let (provider, orchestrator) = orchestrator(
        MockEmbeddingProvider::new(64).fail_texts_containing(
            "poison",
            ProviderError::Upstream {
                status: 503,
                reason: "unavailable".into(),
            },
        ),
        1,
    );

    let report = orchestrator
        .match_job_to_resumes(
            MatchInput::new("job", "data engineer spark"),
            vec![
                MatchInput::new("r1", "spark data engineer"),
                MatchInput::new("r2", "poison resume"),
            ],
            10,
            &CancellationToken::new(),
        )
        .await
        .expect("partial result");

    assert_eq!(report.status, MatchStatus::Partial);
    assert_eq!(ids(&report, Role::Job), ["r1"]);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].id, UnitId::from("r2"));
    assert_eq!(report.excluded[0].kind, "retry_exhausted");
    // query + r1 + two attempts for r2
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test]
async fn test_empty_query_fails_request() {
    let (provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(64), 10);

    let err = orchestrator
        .match_job_to_resumes(
            MatchInput::new("job", "  "),
            vec![MatchInput::new("r1", "anything")],
            10,
            &CancellationToken::new(),
        )
        .await
        .expect_err("query is empty");

    assert!(matches!(err, MatchError::QueryRejected { .. }));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_query_embedding_failure_fails_request() {
    let (provider, orchestrator) = orchestrator(
        MockEmbeddingProvider::new(64).fail_texts_containing(
            "broken",
            ProviderError::InvalidInput {
                reason: "unsupported".into(),
            },
        ),
        10,
    );

    let err = orchestrator
        .match_job_to_resumes(
            MatchInput::new("job", "broken job text"),
            vec![MatchInput::new("r1", "rust")],
            10,
            &CancellationToken::new(),
        )
        .await
        .expect_err("query fails");

    match err {
        MatchError::QueryFailed { id, failure, .. } => {
            assert_eq!(id, UnitId::from("job"));
            assert_eq!(failure.kind(), "provider_invalid_input");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Candidates are not embedded once the query failed.
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_cancelled_request_fails_without_provider_calls() {
    let (provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(64), 10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .match_job_to_resumes(
            MatchInput::new("job", "rust"),
            vec![MatchInput::new("r1", "rust")],
            10,
            &cancel,
        )
        .await
        .expect_err("cancelled");

    assert!(matches!(
        err,
        MatchError::QueryFailed {
            failure: crate::embedding::EmbedFailure::Cancelled,
            ..
        }
    ));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let (provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(64), 10);
    let job = MatchInput::new("job", "golang kubernetes");
    let resumes = vec![
        MatchInput::new("r1", "golang developer"),
        MatchInput::new("r2", "kubernetes operator"),
    ];

    let first = orchestrator
        .match_job_to_resumes(job.clone(), resumes.clone(), 10, &CancellationToken::new())
        .await
        .expect("first");
    let calls = provider.call_count();

    let second = orchestrator
        .match_job_to_resumes(job, resumes, 10, &CancellationToken::new())
        .await
        .expect("second");

    assert_eq!(provider.call_count(), calls);
    assert_eq!(first.results, second.results);
    assert_ne!(first.request_id, second.request_id);
    assert!(orchestrator.cache().stats().hits >= 3);
}

#[tokio::test]
async fn test_execute_accepts_profiles() {
    let (_provider, orchestrator) = orchestrator(MockEmbeddingProvider::new(128), 10);
    let request: MatchRequest = serde_json::from_str(
        r#"{
            "query_role": "JOB",
            "query": {"job": {"id": "j1", "title": "Rust Engineer",
                      "required_skills": [{"name": "Rust", "min_years": 3}]}},
            "candidates": [
                {"resume": {"id": "c1", "full_name": "Ada",
                            "skills": [{"name": "Rust", "years": 5}]}},
                {"text": {"id": "c2", "text": "Pastry chef"}}
            ],
            "top_k": 1
        }"#,
    )
    .expect("valid request json");

    let report = orchestrator
        .execute(request, &CancellationToken::new())
        .await
        .expect("ranked");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].job_id, UnitId::from("j1"));
    assert_eq!(report.results[0].resume_id, UnitId::from("c1"));
    assert_eq!(report.status, MatchStatus::Complete);
}

#[test]
fn test_report_serializes_status_and_ids() {
    let report = MatchReport {
        request_id: uuid::Uuid::nil(),
        query_id: UnitId::from("job"),
        query_role: Role::Job,
        status: MatchStatus::Partial,
        results: Vec::new(),
        excluded: vec![Exclusion::duplicate(UnitId::from("r9"))],
        candidates: 2,
        elapsed_ms: 5,
    };

    let json = serde_json::to_value(&report).expect("serializable");
    assert_eq!(json["status"], "PARTIAL");
    assert_eq!(json["query_role"], "JOB");
    assert_eq!(json["excluded"][0]["id"], "r9");
    assert_eq!(report.excluded_ids(), [&UnitId::from("r9")]);
}
