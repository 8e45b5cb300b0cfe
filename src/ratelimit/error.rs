use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// No tokens could be obtained within the configured max wait.
    #[error("rate limit timeout: {cost} tokens not available within {max_wait:?} (waited {waited:?})")]
    Timeout {
        cost: u32,
        waited: Duration,
        max_wait: Duration,
    },

    /// The request can never be satisfied by this bucket.
    #[error("rate limit cost {cost} exceeds bucket capacity {capacity}")]
    CostExceedsCapacity { cost: u32, capacity: u32 },
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;
