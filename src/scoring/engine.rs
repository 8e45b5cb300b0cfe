use std::cmp::Ordering;

use tracing::debug;

use super::error::{SimilarityError, SimilarityResult};
use super::types::{MatchResult, Query};
use crate::embedding::EmbeddingVector;
use crate::text::{Role, UnitId};

/// Cosine similarity of two equal-length slices.
///
/// Accumulates in `f64`. Returns `0.0` when either vector has zero norm and clamps the
/// result to `[-1, 1]`. Callers check lengths; mismatched slices also yield `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Scores and ranks embedding vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimilarityEngine;

impl SimilarityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Cosine similarity of two vectors of the same model.
    pub fn score(&self, a: &EmbeddingVector, b: &EmbeddingVector) -> SimilarityResult<f32> {
        Self::compare(&a.unit_id, a, &b.unit_id, b)
    }

    fn compare(
        left: &UnitId,
        a: &EmbeddingVector,
        right: &UnitId,
        b: &EmbeddingVector,
    ) -> SimilarityResult<f32> {
        Self::check_compatible(left, a, right, b)?;
        Ok(cosine_similarity(&a.values, &b.values))
    }

    /// Ranks `candidates` against `query`, best first, keeping at most `top_k`.
    ///
    /// Equal scores are ordered by candidate id ascending. Any incompatible candidate
    /// fails the whole ranking.
    pub fn rank<'a, I>(
        &self,
        query: Query<'_>,
        candidates: I,
        top_k: usize,
    ) -> SimilarityResult<Vec<MatchResult>>
    where
        I: IntoIterator<Item = (&'a UnitId, &'a EmbeddingVector)>,
    {
        let mut scored: Vec<(&UnitId, f32)> = candidates
            .into_iter()
            .map(|(id, vector)| {
                Self::compare(query.id, query.vector, id, vector).map(|score| (id, score))
            })
            .collect::<SimilarityResult<_>>()?;

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });
        scored.truncate(top_k);

        debug!(query = %query.id, role = %query.role, ranked = scored.len(), "ranked candidates");

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(position, (candidate, score))| {
                let (job_id, resume_id) = match query.role {
                    Role::Job => (query.id.clone(), candidate.clone()),
                    Role::Resume => (candidate.clone(), query.id.clone()),
                };
                MatchResult {
                    job_id,
                    resume_id,
                    score,
                    rank: position + 1,
                }
            })
            .collect())
    }

    fn check_compatible(
        left: &UnitId,
        a: &EmbeddingVector,
        right: &UnitId,
        b: &EmbeddingVector,
    ) -> SimilarityResult<()> {
        if a.model.name != b.model.name || a.model.version != b.model.version {
            return Err(SimilarityError::ModelMismatch {
                left: left.clone(),
                left_model: a.model.to_string(),
                right: right.clone(),
                right_model: b.model.to_string(),
            });
        }
        if a.values.len() != b.values.len() {
            return Err(SimilarityError::DimensionMismatch {
                left: left.clone(),
                left_dims: a.values.len(),
                right: right.clone(),
                right_dims: b.values.len(),
            });
        }
        Ok(())
    }
}
