// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Choice
//!
//! A [`Choice`] is the finalized answer to one processed question. It is
//! immutable once logged; the only permitted mutation is the single
//! escalation step that may rewrite provenance, confidence and reasoning
//! before first persistence (see [`crate::domain::escalation`]).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Choice aggregate and choice-log record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceId(pub Uuid);

impl ChoiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ChoiceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Which mechanism produced a choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    DecisionEngine,
    Learned,
    Human,
    HumanApproved,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionEngine => "decision-engine",
            Self::Learned => "learned",
            Self::Human => "human",
            Self::HumanApproved => "human-approved",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub question: String,
    pub chosen_option: String,
    pub reasoning: String,
    /// Clamped to [0.0, 1.0] on construction
    pub confidence: f64,
    pub consulted_sources: Vec<String>,
    pub alternatives: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl Choice {
    /// Build a decision-engine choice with a fresh identifier.
    pub fn new(
        question: impl Into<String>,
        chosen_option: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: ChoiceId::new(),
            question: question.into(),
            chosen_option: chosen_option.into(),
            reasoning: reasoning.into(),
            confidence: clamp_unit(confidence),
            consulted_sources: Vec::new(),
            alternatives: Vec::new(),
            created_at: Utc::now(),
            provenance: Provenance::DecisionEngine,
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consulted_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Hours elapsed between creation and `now`, never negative.
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.created_at).num_milliseconds() as f64 / 1000.0;
        (seconds / 3600.0).max(0.0)
    }
}

/// Append-only choice log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceLogEntry {
    pub choice: Choice,
    pub cache_hit: bool,
    pub logged_at: DateTime<Utc>,
}

impl ChoiceLogEntry {
    pub fn new(choice: Choice, cache_hit: bool) -> Self {
        Self {
            choice,
            cache_hit,
            logged_at: Utc::now(),
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_choice_id_round_trips_through_display() {
        let id = ChoiceId::new();
        let parsed: ChoiceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ChoiceId>().is_err());
    }

    #[test]
    fn test_provenance_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Provenance::HumanApproved).unwrap(),
            "\"human-approved\""
        );
        assert_eq!(
            serde_json::to_string(&Provenance::DecisionEngine).unwrap(),
            "\"decision-engine\""
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Choice::new("q", "a", "r", 1.7).confidence, 1.0);
        assert_eq!(Choice::new("q", "a", "r", -0.2).confidence, 0.0);
        assert_eq!(Choice::new("q", "a", "r", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_elapsed_hours() {
        let mut choice = Choice::new("q", "a", "r", 0.5);
        let now = Utc::now();
        choice.created_at = now - Duration::minutes(90);
        assert!((choice.elapsed_hours(now) - 1.5).abs() < 1e-9);
        choice.created_at = now + Duration::minutes(5);
        assert_eq!(choice.elapsed_hours(now), 0.0);
    }
}
