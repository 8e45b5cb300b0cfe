//! Embedmatch command-line entrypoint.
//!
//! Usage: `embedmatch <request.json>`. Reads a [`MatchRequest`], runs it against the
//! configured provider and prints the report as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use serde::Serialize;
use tokio::signal;

use embedmatch::config::Config;
use embedmatch::{
    CancellationToken, EmbeddingClient, HttpEmbeddingProvider, MatchReport, MatchRequest,
    MatchingOrchestrator, Normalizer, RateLimiter, UsageSnapshot,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Serialize)]
struct Output {
    report: MatchReport,
    usage: UsageSnapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: embedmatch <request.json>")?;

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(
        model = %config.model(),
        batch_size = config.batch_size,
        rate_capacity = config.rate_capacity,
        "Embedmatch starting"
    );

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut request: MatchRequest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse match request {}", path.display()))?;

    let provider = Arc::new(HttpEmbeddingProvider::new(config.provider_config()?)?);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_config()));
    let client = Arc::new(EmbeddingClient::new(
        provider,
        limiter,
        config.retry_policy(),
        config.client_config(),
    ));
    let orchestrator = MatchingOrchestrator::new(
        Arc::clone(&client),
        Normalizer::new(config.normalizer_config()),
        config.cache_config(),
    )?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    request.top_k = request.top_k.or(Some(config.top_k));
    let report = orchestrator.execute(request, &cancel).await?;

    let output = Output {
        report,
        usage: client.usage().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    tracing::info!(
        status = ?output.report.status,
        results = output.report.results.len(),
        excluded = output.report.excluded.len(),
        "Embedmatch finished"
    );
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Ctrl+C received, no further batches will be issued");
            cancel.cancel();
        }
        Err(e) => tracing::error!("Failed to install Ctrl+C handler: {}", e),
    }
}
