use thiserror::Error;

use super::UnitId;

/// Raw text that cannot become a [`super::TextUnit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("text for '{id}' is empty after normalization")]
    Empty { id: UnitId },

    #[error("text for '{id}' has {chars} characters, limit is {max_chars}")]
    TooLong {
        id: UnitId,
        chars: usize,
        max_chars: usize,
    },
}

impl TextError {
    pub fn id(&self) -> &UnitId {
        match self {
            TextError::Empty { id } | TextError::TooLong { id, .. } => id,
        }
    }
}
