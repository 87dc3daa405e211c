// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Question identity and classification types
//!
//! A question is identified in the knowledge base solely by its
//! [`Fingerprint`]: a SHA-256 digest of the trimmed, lowercased text.
//! Punctuation survives normalization, so "Can I delete /tmp/test?" and
//! "can i delete /tmp/test" are two different questions. Fuzzy matching is
//! deliberately not attempted.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Question fingerprinting and classification value objects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Normalize question text for identity purposes.
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Knowledge-base identity key for a question
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the given question text.
    pub fn of(question: &str) -> Self {
        let digest = Sha256::digest(normalize(question).as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handling category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    /// Subjective or strategic: a human has to choose
    HumanDecision,
    /// Objective or factual: can be answered without a human
    AgentAnswerable,
    /// Needs exploration of options followed by a decision
    Hybrid,
    /// Too ambiguous to act on
    ClarificationNeeded,
}

impl QuestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HumanDecision => "human_decision",
            Self::AgentAnswerable => "agent_answerable",
            Self::Hybrid => "hybrid",
            Self::ClarificationNeeded => "clarification_needed",
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: QuestionCategory,
    /// Best-effort confidence in the category, 0.0 to 1.0
    pub confidence: f64,
    /// Pattern groups that matched, e.g. `decision.explicit_choice`
    pub matched_evidence: Vec<String>,
    pub reasoning: String,
}

impl Classification {
    pub fn has_evidence(&self) -> bool {
        !self.matched_evidence.is_empty()
    }
}
