use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{Span, debug, field, info, instrument, warn};
use uuid::Uuid;

use super::error::MatchError;
use super::types::{Exclusion, MatchInput, MatchPhase, MatchReport, MatchRequest, MatchStatus};
use crate::cache::{CacheConfig, CacheResult, EmbeddingCache};
use crate::cancel::CancellationToken;
use crate::constants::DEFAULT_TOP_K;
use crate::embedding::{EmbedFailure, EmbeddingClient};
use crate::scoring::{Query, SimilarityEngine};
use crate::text::{Normalizer, Role, TextUnit};

/// Runs match requests end to end: normalize, embed through the cache, rank.
///
/// Candidates that cannot be normalized or embedded are excluded with a reason and the
/// request completes as [`MatchStatus::Partial`]. Only a failing query fails the
/// request.
#[derive(Debug, Clone)]
pub struct MatchingOrchestrator {
    normalizer: Normalizer,
    client: Arc<EmbeddingClient>,
    cache: EmbeddingCache,
    engine: SimilarityEngine,
}

impl MatchingOrchestrator {
    /// Builds an orchestrator with a cache keyed to the client's model.
    pub fn new(
        client: Arc<EmbeddingClient>,
        normalizer: Normalizer,
        cache_config: CacheConfig,
    ) -> CacheResult<Self> {
        let cache = EmbeddingCache::new(client.model().clone(), cache_config)?;
        Ok(Self {
            normalizer,
            client,
            cache,
            engine: SimilarityEngine::new(),
        })
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn client(&self) -> &Arc<EmbeddingClient> {
        &self.client
    }

    /// Ranks `resumes` against `job`.
    pub async fn match_job_to_resumes(
        &self,
        job: MatchInput,
        resumes: Vec<MatchInput>,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        self.run(Role::Job, job, resumes, top_k, cancel).await
    }

    /// Ranks `jobs` against `resume`.
    pub async fn match_resume_to_jobs(
        &self,
        resume: MatchInput,
        jobs: Vec<MatchInput>,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        self.run(Role::Resume, resume, jobs, top_k, cancel).await
    }

    /// Dispatches a deserialized [`MatchRequest`].
    pub async fn execute(
        &self,
        request: MatchRequest,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        let query = MatchInput::from(request.query);
        let candidates = request.candidates.into_iter().map(MatchInput::from).collect();
        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);

        match request.query_role {
            Role::Job => self.match_job_to_resumes(query, candidates, top_k, cancel).await,
            Role::Resume => {
                self.match_resume_to_jobs(query, candidates, top_k, cancel)
                    .await
            }
        }
    }

    #[instrument(
        skip_all,
        fields(
            request_id = field::Empty,
            role = %role,
            query = %query.id,
            candidates = candidates.len(),
        )
    )]
    async fn run(
        &self,
        role: Role,
        query: MatchInput,
        candidates: Vec<MatchInput>,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", field::display(&request_id));
        let started = Instant::now();
        let candidate_count = candidates.len();

        debug!(phase = %MatchPhase::Collecting, "collecting inputs");
        let query_unit = self
            .normalizer
            .unit(query.id.clone(), role, &query.text)
            .map_err(|source| {
                warn!(phase = %MatchPhase::Failed, error = %source, "query rejected");
                MatchError::QueryRejected { request_id, source }
            })?;

        let mut excluded: Vec<(usize, Exclusion)> = Vec::new();
        let mut units: Vec<(usize, TextUnit)> = Vec::with_capacity(candidate_count);
        let mut seen = HashSet::with_capacity(candidate_count);
        for (position, candidate) in candidates.into_iter().enumerate() {
            if !seen.insert(candidate.id.clone()) {
                excluded.push((position, Exclusion::duplicate(candidate.id)));
                continue;
            }
            match self
                .normalizer
                .unit(candidate.id, role.counterpart(), &candidate.text)
            {
                Ok(unit) => units.push((position, unit)),
                Err(err) => excluded.push((position, Exclusion::rejected(&err))),
            }
        }

        debug!(phase = %MatchPhase::Embedding, units = units.len() + 1, "embedding");
        let query_vector = {
            let client = Arc::clone(&self.client);
            let cancel = cancel.clone();
            self.cache
                .get_or_compute(&query_unit, move |unit| async move {
                    client.embed_one(unit, &cancel).await
                })
                .await
        }
        .map_err(|failure| {
            warn!(phase = %MatchPhase::Failed, error = %failure, "query could not be embedded");
            MatchError::QueryFailed {
                request_id,
                id: query_unit.id().clone(),
                failure,
            }
        })?;

        let candidate_units: Vec<TextUnit> = units.iter().map(|(_, unit)| unit.clone()).collect();
        let mut resolved = if candidate_units.is_empty() {
            Default::default()
        } else {
            let client = Arc::clone(&self.client);
            let cancel = cancel.clone();
            self.cache
                .resolve_many(&candidate_units, move |batch| async move {
                    client.embed(batch, &cancel).await
                })
                .await
        };

        let mut embedded = Vec::with_capacity(units.len());
        for (position, unit) in &units {
            match resolved.remove(unit.id()) {
                Some(Ok(vector)) => embedded.push((unit.id(), vector)),
                Some(Err(failure)) => {
                    excluded.push((*position, Exclusion::failed(unit.id().clone(), &failure)))
                }
                None => excluded.push((
                    *position,
                    Exclusion::failed(
                        unit.id().clone(),
                        &EmbedFailure::CacheCoalesceFailure {
                            reason: "no result returned for candidate".to_string(),
                        },
                    ),
                )),
            }
        }

        debug!(phase = %MatchPhase::Scoring, embedded = embedded.len(), "scoring");
        let results = self
            .engine
            .rank(
                Query {
                    id: query_unit.id(),
                    role,
                    vector: &query_vector,
                },
                embedded.iter().map(|(id, vector)| (*id, vector.as_ref())),
                top_k,
            )
            .map_err(|source| {
                warn!(phase = %MatchPhase::Failed, error = %source, "incompatible vectors");
                MatchError::Incompatible { request_id, source }
            })?;

        excluded.sort_by_key(|(position, _)| *position);
        let excluded: Vec<Exclusion> = excluded.into_iter().map(|(_, e)| e).collect();
        let status = if excluded.is_empty() {
            MatchStatus::Complete
        } else {
            MatchStatus::Partial
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            phase = %MatchPhase::from(status),
            results = results.len(),
            excluded = excluded.len(),
            elapsed_ms,
            "match request finished"
        );

        Ok(MatchReport {
            request_id,
            query_id: query_unit.id().clone(),
            query_role: role,
            status,
            results,
            excluded,
            candidates: candidate_count,
            elapsed_ms,
        })
    }
}
