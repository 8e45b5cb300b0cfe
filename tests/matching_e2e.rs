//! End-to-end matching tests against the mock provider.

mod common;

use std::time::Duration;

use common::fixtures::{EngineBuilder, R2_MARKER, job, resumes};
use embedmatch::{
    CancellationToken, EmbedFailure, MatchError, MatchStatus, MockEmbeddingProvider,
    ProviderError, UnitId,
};

fn ranked_ids(report: &embedmatch::MatchReport) -> Vec<&str> {
    report.results.iter().map(|r| r.resume_id.as_str()).collect()
}

#[tokio::test]
async fn test_job_ranks_resumes_by_similarity() {
    let engine = EngineBuilder::new().build();

    let report = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 10, &CancellationToken::new())
        .await
        .expect("ranked");

    assert_eq!(report.status, MatchStatus::Complete);
    assert_eq!(ranked_ids(&report), ["R1", "R3", "R2"]);
    assert!(report.excluded.is_empty());

    for (i, result) in report.results.iter().enumerate() {
        assert_eq!(result.rank, i + 1);
        assert_eq!(result.job_id, UnitId::from("J"));
        assert!((-1.0..=1.0).contains(&result.score));
    }
    assert!(report.results.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(report.results[2].score, 0.0);
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let engine = EngineBuilder::new().build();

    let report = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 1, &CancellationToken::new())
        .await
        .expect("ranked");

    assert_eq!(ranked_ids(&report), ["R1"]);
    assert_eq!(report.status, MatchStatus::Complete);
}

#[tokio::test]
async fn test_permanent_failure_excludes_only_that_candidate() {
    let engine = EngineBuilder::new()
        .provider(MockEmbeddingProvider::new(common::fixtures::MOCK_DIMENSIONS).fail_texts_containing(
            R2_MARKER,
            ProviderError::InvalidInput {
                reason: "content blocked".into(),
            },
        ))
        .batch_size(1)
        .build();

    let report = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 10, &CancellationToken::new())
        .await
        .expect("partial ranking");

    assert_eq!(report.status, MatchStatus::Partial);
    assert_eq!(ranked_ids(&report), ["R1", "R3"]);
    assert_eq!(report.excluded_ids(), [&UnitId::from("R2")]);
    assert_eq!(report.excluded[0].kind, "provider_invalid_input");
    assert!(report.excluded[0].reason.contains("content blocked"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_transparently() {
    let engine = EngineBuilder::new()
        .provider(MockEmbeddingProvider::new(common::fixtures::MOCK_DIMENSIONS).fail_next(
            2,
            ProviderError::Upstream {
                status: 503,
                reason: "overloaded".into(),
            },
        ))
        .build();

    let report = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 10, &CancellationToken::new())
        .await
        .expect("ranked after retries");

    assert_eq!(report.status, MatchStatus::Complete);
    assert_eq!(ranked_ids(&report), ["R1", "R3", "R2"]);

    let usage = engine.client.usage().snapshot();
    assert_eq!(usage.retries, 2);
    assert_eq!(usage.exhausted, 0);
    assert_eq!(usage.texts_embedded, 4);
}

#[tokio::test(start_paused = true)]
async fn test_rate_budget_exhaustion_makes_request_partial() {
    // Two tokens per minute: the query and one candidate fit, the rest time out.
    let engine = EngineBuilder::new()
        .batch_size(1)
        .rate_limit(2, Duration::from_secs(60), Duration::from_millis(100))
        .build();

    let report = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 10, &CancellationToken::new())
        .await
        .expect("partial ranking");

    assert_eq!(report.status, MatchStatus::Partial);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.excluded.len(), 2);
    assert!(
        report
            .excluded
            .iter()
            .all(|e| e.kind == "rate_limit_timeout")
    );
    assert_eq!(engine.provider.call_count(), 2);
    assert_eq!(engine.client.usage().snapshot().rate_limit_timeouts, 2);
}

#[tokio::test]
async fn test_concurrent_requests_embed_each_text_once() {
    let engine = EngineBuilder::new().build();
    let orchestrator = &engine.orchestrator;
    let cancel = CancellationToken::new();

    let (a, b, c) = tokio::join!(
        orchestrator.match_job_to_resumes(job(), resumes(), 10, &cancel),
        orchestrator.match_job_to_resumes(job(), resumes(), 10, &cancel),
        orchestrator.match_job_to_resumes(job(), resumes(), 10, &cancel),
    );

    for report in [a, b, c] {
        let report = report.expect("ranked");
        assert_eq!(ranked_ids(&report), ["R1", "R3", "R2"]);
    }
    assert_eq!(engine.provider.texts_embedded(), 4);
    assert_eq!(orchestrator.cache().pending_len(), 0);
}

#[tokio::test]
async fn test_cancelled_request_does_not_fail_live_request() {
    let engine = EngineBuilder::new().build();
    let orchestrator = &engine.orchestrator;
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let live = CancellationToken::new();

    let (a, b) = tokio::join!(
        orchestrator.match_job_to_resumes(job(), resumes(), 10, &cancelled),
        orchestrator.match_job_to_resumes(job(), resumes(), 10, &live),
    );

    assert!(matches!(
        a,
        Err(MatchError::QueryFailed {
            failure: EmbedFailure::Cancelled,
            ..
        })
    ));
    let report = b.expect("live request is unaffected by the cancelled one");
    assert_eq!(report.status, MatchStatus::Complete);
    assert_eq!(ranked_ids(&report), ["R1", "R3", "R2"]);
    assert!(report.excluded.is_empty());
    assert_eq!(engine.provider.texts_embedded(), 4);
    assert_eq!(orchestrator.cache().pending_len(), 0);
}

#[tokio::test]
async fn test_resume_and_job_directions_agree() {
    let engine = EngineBuilder::new().build();
    let resume = resumes().remove(0);

    let jobs = vec![
        job(),
        embedmatch::MatchInput::new("J2", "Pastry chef wanted for bakery"),
    ];
    let report = engine
        .orchestrator
        .match_resume_to_jobs(resume, jobs, 10, &CancellationToken::new())
        .await
        .expect("ranked");

    let ids: Vec<&str> = report.results.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids, ["J", "J2"]);
    assert!(report.results.iter().all(|r| r.resume_id == UnitId::from("R1")));

    let forward = engine
        .orchestrator
        .match_job_to_resumes(job(), resumes(), 10, &CancellationToken::new())
        .await
        .expect("ranked");
    assert_eq!(forward.results[0].score, report.results[0].score);
}
