// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Knowledge Base Records
//!
//! [`LearnedAnswer`] is the cached resolution of a question, keyed by its
//! [`Fingerprint`]. Records are never deleted: a failure lowers confidence and
//! appends context to `failure_history` instead of erasing what was learned.
//!
//! Confidence and the success/failure bookkeeping only change through
//! [`LearnedAnswer::reinforce`] and [`LearnedAnswer::revise`], which the
//! outcome processor drives via the knowledge repository.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Learned answer aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::choice::{clamp_unit, Choice, Provenance};
use crate::domain::question::Fingerprint;

/// One entry of a learned answer's failure history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub recorded_at: DateTime<Utc>,
    pub failure_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedAnswer {
    pub fingerprint: Fingerprint,
    pub question: String,
    pub chosen_option: String,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub consulted_sources: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub learned_at: DateTime<Utc>,
    /// Incremented on every cache hit
    #[serde(default)]
    pub times_used: u64,
    pub provenance: Provenance,
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_history: Vec<FailureRecord>,
}

impl LearnedAnswer {
    /// Learn a finalized choice. Usage and outcome bookkeeping start empty.
    pub fn from_choice(choice: &Choice) -> Self {
        Self {
            fingerprint: Fingerprint::of(&choice.question),
            question: choice.question.clone(),
            chosen_option: choice.chosen_option.clone(),
            reasoning: choice.reasoning.clone(),
            confidence: choice.confidence,
            consulted_sources: choice.consulted_sources.clone(),
            alternatives: choice.alternatives.clone(),
            learned_at: Utc::now(),
            times_used: 0,
            provenance: choice.provenance,
            needs_review: false,
            success_count: 0,
            last_success: None,
            failure_history: Vec::new(),
        }
    }

    pub fn record_use(&mut self) {
        self.times_used = self.times_used.saturating_add(1);
    }

    /// Apply a confirmed success.
    pub fn reinforce(&mut self, adjusted_confidence: f64, at: DateTime<Utc>) {
        self.confidence = clamp_unit(adjusted_confidence);
        self.success_count = self.success_count.saturating_add(1);
        self.last_success = Some(at);
        self.needs_review = false;
    }

    /// Apply a confirmed failure. History is only ever appended to.
    pub fn revise(&mut self, adjusted_confidence: f64, failure: FailureRecord) {
        self.confidence = clamp_unit(adjusted_confidence);
        self.needs_review = true;
        self.failure_history.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learned() -> LearnedAnswer {
        let choice = Choice::new("Should we use MongoDB or PostgreSQL?", "PostgreSQL", "r", 0.85)
            .with_sources(["Architecture", "Security"]);
        LearnedAnswer::from_choice(&choice)
    }

    #[test]
    fn test_from_choice_copies_answer_and_resets_usage() {
        let answer = learned();
        assert_eq!(answer.fingerprint, Fingerprint::of("should we use mongodb or postgresql?"));
        assert_eq!(answer.chosen_option, "PostgreSQL");
        assert_eq!(answer.provenance, Provenance::DecisionEngine);
        assert_eq!(answer.times_used, 0);
        assert!(answer.failure_history.is_empty());
    }

    #[test]
    fn test_reinforce_clears_review_flag() {
        let mut answer = learned();
        answer.needs_review = true;
        let now = Utc::now();
        answer.reinforce(0.95, now);
        assert_eq!(answer.confidence, 0.95);
        assert_eq!(answer.success_count, 1);
        assert_eq!(answer.last_success, Some(now));
        assert!(!answer.needs_review);
    }

    #[test]
    fn test_revise_appends_history() {
        let mut answer = learned();
        for i in 0..3 {
            answer.revise(
                0.55,
                FailureRecord {
                    recorded_at: Utc::now(),
                    failure_signals: vec![format!("failure {i}")],
                    feedback: None,
                },
            );
        }
        assert!(answer.needs_review);
        assert_eq!(answer.failure_history.len(), 3);
        assert_eq!(answer.failure_history[0].failure_signals, vec!["failure 0"]);
    }

    #[test]
    fn test_deserializes_record_without_optional_fields() {
        let json = serde_json::json!({
            "fingerprint": "abc",
            "question": "q",
            "chosen_option": "a",
            "reasoning": "r",
            "confidence": 0.7,
            "learned_at": "2026-01-01T00:00:00Z",
            "provenance": "human"
        });
        let answer: LearnedAnswer = serde_json::from_value(json).unwrap();
        assert_eq!(answer.times_used, 0);
        assert!(!answer.needs_review);
        assert_eq!(answer.provenance, Provenance::Human);
    }
}
