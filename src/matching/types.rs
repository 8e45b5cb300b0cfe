use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::EmbedFailure;
use crate::scoring::MatchResult;
use crate::text::{JobProfile, ResumeProfile, Role, TextError, UnitId};

/// Raw text to match, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInput {
    pub id: UnitId,
    pub text: String,
}

impl MatchInput {
    pub fn new(id: impl Into<UnitId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

impl From<&ResumeProfile> for MatchInput {
    fn from(profile: &ResumeProfile) -> Self {
        Self::new(profile.id.clone(), profile.compose())
    }
}

impl From<&JobProfile> for MatchInput {
    fn from(profile: &JobProfile) -> Self {
        Self::new(profile.id.clone(), profile.compose())
    }
}

/// A match participant given either as plain text or as a structured profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSubject {
    Text(MatchInput),
    Resume(ResumeProfile),
    Job(JobProfile),
}

impl From<MatchSubject> for MatchInput {
    fn from(subject: MatchSubject) -> Self {
        match subject {
            MatchSubject::Text(input) => input,
            MatchSubject::Resume(profile) => MatchInput::from(&profile),
            MatchSubject::Job(profile) => MatchInput::from(&profile),
        }
    }
}

/// A complete match request, e.g. read from a JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchRequest {
    /// Role of `query`; candidates take the other role.
    pub query_role: Role,
    pub query: MatchSubject,
    #[serde(default)]
    pub candidates: Vec<MatchSubject>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Collecting,
    Embedding,
    Scoring,
    Complete,
    Partial,
    Failed,
}

impl MatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPhase::Collecting => "collecting",
            MatchPhase::Embedding => "embedding",
            MatchPhase::Scoring => "scoring",
            MatchPhase::Complete => "complete",
            MatchPhase::Partial => "partial",
            MatchPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a request that produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Complete,
    /// At least one candidate was excluded.
    Partial,
}

impl From<MatchStatus> for MatchPhase {
    fn from(status: MatchStatus) -> Self {
        match status {
            MatchStatus::Complete => MatchPhase::Complete,
            MatchStatus::Partial => MatchPhase::Partial,
        }
    }
}

/// A candidate left out of the ranking, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub id: UnitId,
    pub kind: String,
    pub reason: String,
}

impl Exclusion {
    pub fn duplicate(id: UnitId) -> Self {
        Self {
            reason: format!("candidate id '{id}' appears more than once"),
            id,
            kind: "duplicate_id".to_string(),
        }
    }

    pub fn rejected(error: &TextError) -> Self {
        Self::failed(
            error.id().clone(),
            &EmbedFailure::TextRejected {
                reason: error.to_string(),
            },
        )
    }

    pub fn failed(id: UnitId, failure: &EmbedFailure) -> Self {
        Self {
            id,
            kind: failure.kind().to_string(),
            reason: failure.to_string(),
        }
    }
}

/// Ranked results of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub request_id: Uuid,
    pub query_id: UnitId,
    pub query_role: Role,
    pub status: MatchStatus,
    pub results: Vec<MatchResult>,
    pub excluded: Vec<Exclusion>,
    /// Candidates received, duplicates included.
    pub candidates: usize,
    pub elapsed_ms: u64,
}

impl MatchReport {
    pub fn excluded_ids(&self) -> Vec<&UnitId> {
        self.excluded.iter().map(|e| &e.id).collect()
    }
}
