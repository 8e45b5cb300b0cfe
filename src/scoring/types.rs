use serde::Serialize;

use crate::embedding::EmbeddingVector;
use crate::text::{Role, UnitId};

/// The unit candidates are ranked against.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    pub id: &'a UnitId,
    pub role: Role,
    pub vector: &'a EmbeddingVector,
}

/// One ranked (job, resume) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub job_id: UnitId,
    pub resume_id: UnitId,
    pub score: f32,
    /// 1-based position in the ranking.
    pub rank: usize,
}
