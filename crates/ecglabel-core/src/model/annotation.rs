use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::SignalId;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Rater identity
// ---------------------------------------------------------------------------

/// Identifier of a human rater (e.g. `"user1"`, `"dr-lima"`).
///
/// Non-empty and free of whitespace so it can occupy one log column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaterId(String);

impl RaterId {
    /// Validate and wrap a rater identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRater`] for empty IDs or IDs that
    /// contain whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, EngineError> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(EngineError::InvalidRater(raw));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RaterId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RaterId> for String {
    fn from(value: RaterId) -> Self {
        value.0
    }
}

impl FromStr for RaterId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

/// What a rater does in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RaterRole {
    /// Labels the signals in their assignment.
    #[default]
    Classifier,
    /// Adjudicates signals on which the quorum disagreed.
    Reviewer,
}

impl RaterRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for RaterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Rhythm classification assigned to a signal.
///
/// The four standard labels parse case-insensitively. Any other non-empty
/// single-line string becomes [`Label::Custom`], so deployments can extend
/// the vocabulary through configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Label {
    Normal,
    Fibrillation,
    Noisy,
    Other,
    Custom(String),
}

impl Label {
    /// The standard vocabulary, in button order.
    pub const STANDARD: [Self; 4] = [Self::Fibrillation, Self::Normal, Self::Noisy, Self::Other];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "Normal",
            Self::Fibrillation => "Fibrillation",
            Self::Noisy => "Noisy",
            Self::Other => "Other",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("label is empty".to_string());
        }
        if trimmed.contains(['\t', '\n', '\r']) {
            return Err(format!("label contains a control separator: {trimmed:?}"));
        }
        let label = match trimmed.to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            "fibrillation" => Self::Fibrillation,
            "noisy" => Self::Noisy,
            "other" => Self::Other,
            _ => Self::Custom(trimmed.to_string()),
        };
        Ok(label)
    }
}

impl TryFrom<String> for Label {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        match value {
            Label::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

/// The labels a deployment accepts, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    /// Build a set, dropping repeated labels while keeping first-seen order.
    #[must_use]
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut out: Vec<Label> = Vec::new();
        for label in labels {
            if !out.contains(&label) {
                out.push(label);
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn standard() -> Self {
        Self::new(Label::STANDARD)
    }

    #[must_use]
    pub fn contains(&self, label: &Label) -> bool {
        self.0.contains(label)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    /// Parse raw user input and check it against the set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLabel`] when the input is malformed or
    /// names a label outside the set.
    pub fn parse(&self, raw: &str) -> Result<Label, EngineError> {
        let label = raw.parse::<Label>().map_err(|_| self.rejection(raw))?;
        if self.contains(&label) {
            Ok(label)
        } else {
            Err(self.rejection(raw))
        }
    }

    /// Build the error reported for a label outside the set.
    #[must_use]
    pub fn rejection(&self, raw: &str) -> EngineError {
        EngineError::InvalidLabel {
            label: raw.trim().to_string(),
            allowed: self.to_string(),
        }
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Label::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Annotation events
// ---------------------------------------------------------------------------

/// One append-only annotation record.
///
/// Events are never edited; a correction is a new event for the same
/// `(signal_id, rater_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationEvent {
    pub signal_id: SignalId,
    pub rater_id: RaterId,
    pub label: Label,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
