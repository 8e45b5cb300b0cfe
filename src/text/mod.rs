//! Text units and normalization.
//!
//! A [`TextUnit`] is the only thing the embedding pipeline sees of a resume or job: an
//! id, a role, and normalized text. Units are built through [`Normalizer::unit`], which
//! trims, collapses whitespace and enforces the configured length limit, so a unit's
//! text is always in its final, fingerprintable form.

pub mod compose;
mod error;


pub use compose::{
    EducationEntry, ExperienceEntry, JobProfile, RequiredSkill, ResumeProfile, SkillEntry,
};
pub use error::TextError;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_TEXT_CHARS;

/// Identifier of a resume or job, supplied by the owning service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for UnitId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a match a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Resume,
    Job,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resume => "RESUME",
            Role::Job => "JOB",
        }
    }

    /// The role a query of this role is matched against.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Resume => Role::Job,
            Role::Job => Role::Resume,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, normalized unit of text to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    id: UnitId,
    role: Role,
    text: String,
    truncated: bool,
}

impl TextUnit {
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Normalized text (what gets fingerprinted and sent to the provider).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `true` if the raw input exceeded the length limit and was cut.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

/// What to do with text longer than the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    #[default]
    Truncate,
    Reject,
}

impl std::str::FromStr for OversizePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(OversizePolicy::Truncate),
            "reject" => Ok(OversizePolicy::Reject),
            other => Err(format!("unknown oversize policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Max characters (not bytes) of normalized text.
    pub max_chars: usize,
    pub oversize: OversizePolicy,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_TEXT_CHARS,
            oversize: OversizePolicy::Truncate,
        }
    }
}

/// Builds [`TextUnit`]s from raw text.
///
/// Normalization is idempotent: feeding a unit's text back through the same normalizer
/// returns it unchanged.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes `raw` and wraps it in a [`TextUnit`].
    pub fn unit(
        &self,
        id: impl Into<UnitId>,
        role: Role,
        raw: &str,
    ) -> Result<TextUnit, TextError> {
        let id = id.into();
        let (text, truncated) = self.normalize(raw).map_err(|reason| match reason {
            NormalizeFailure::Empty => TextError::Empty { id: id.clone() },
            NormalizeFailure::TooLong { chars } => TextError::TooLong {
                id: id.clone(),
                chars,
                max_chars: self.config.max_chars,
            },
        })?;

        Ok(TextUnit {
            id,
            role,
            text,
            truncated,
        })
    }

    /// Trims, collapses every whitespace run to a single space and applies the length
    /// policy. Returns the text and whether it was truncated.
    fn normalize(&self, raw: &str) -> Result<(String, bool), NormalizeFailure> {
        let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(NormalizeFailure::Empty);
        }

        let Some((cut, _)) = text.char_indices().nth(self.config.max_chars) else {
            return Ok((text, false));
        };

        match self.config.oversize {
            OversizePolicy::Reject => Err(NormalizeFailure::TooLong {
                chars: text.chars().count(),
            }),
            OversizePolicy::Truncate => {
                text.truncate(cut);
                // A cut right after a word leaves a trailing space that a second pass
                // would strip.
                let kept = text.trim_end().len();
                text.truncate(kept);
                if text.is_empty() {
                    return Err(NormalizeFailure::Empty);
                }
                Ok((text, true))
            }
        }
    }
}

enum NormalizeFailure {
    Empty,
    TooLong { chars: usize },
}
