//! Cosine similarity and top-k ranking over embedding vectors.
//!
//! Only vectors from the same [`crate::embedding::ModelIdentity`] with equal
//! dimensionality are comparable; anything else is an error rather than a silently
//! meaningless score.

mod engine;
mod error;
mod types;


pub use engine::{SimilarityEngine, cosine_similarity};
pub use error::{SimilarityError, SimilarityResult};
pub use types::{MatchResult, Query};
