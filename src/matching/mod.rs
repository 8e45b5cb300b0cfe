//! Request orchestration: one query against many candidates.
//!
//! A request moves through `Collecting → Embedding → Scoring` and ends `Complete`,
//! `Partial` (some candidates excluded, each with a reason) or `Failed` (the query
//! itself could not be normalized or embedded). Every request carries a UUID that is
//! recorded on its tracing span and returned in the [`MatchReport`].

mod error;
mod orchestrator;
mod types;

#[cfg(test)]
mod tests;

pub use error::MatchError;
pub use orchestrator::MatchingOrchestrator;
pub use types::{
    Exclusion, MatchInput, MatchPhase, MatchReport, MatchRequest, MatchStatus, MatchSubject,
};
