use thiserror::Error;
use uuid::Uuid;

use crate::embedding::EmbedFailure;
use crate::scoring::SimilarityError;
use crate::text::{TextError, UnitId};

/// A request that could not produce a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("request {request_id}: query rejected: {source}")]
    QueryRejected {
        request_id: Uuid,
        #[source]
        source: TextError,
    },

    #[error("request {request_id}: query '{id}' could not be embedded: {failure}")]
    QueryFailed {
        request_id: Uuid,
        id: UnitId,
        failure: EmbedFailure,
    },

    #[error("request {request_id}: {source}")]
    Incompatible {
        request_id: Uuid,
        #[source]
        source: SimilarityError,
    },
}

impl MatchError {
    pub fn request_id(&self) -> Uuid {
        match self {
            MatchError::QueryRejected { request_id, .. }
            | MatchError::QueryFailed { request_id, .. }
            | MatchError::Incompatible { request_id, .. } => *request_id,
        }
    }
}
