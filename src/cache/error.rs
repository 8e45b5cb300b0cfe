use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Invalid cache settings.
    #[error("invalid cache configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
