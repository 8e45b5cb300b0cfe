use thiserror::Error;

use crate::text::UnitId;

/// Two vectors that cannot be compared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimilarityError {
    #[error("dimension mismatch between '{left}' ({left_dims}d) and '{right}' ({right_dims}d)")]
    DimensionMismatch {
        left: UnitId,
        left_dims: usize,
        right: UnitId,
        right_dims: usize,
    },

    #[error("model mismatch between '{left}' ({left_model}) and '{right}' ({right_model})")]
    ModelMismatch {
        left: UnitId,
        left_model: String,
        right: UnitId,
        right_model: String,
    },
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;
