// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outcome
//!
//! An [`Outcome`] records what actually happened after a choice was acted on,
//! and carries the confidence adjustment derived from it. One outcome is kept
//! per choice identifier; reporting again overwrites.
//!
//! Confidence adjustment for prior confidence `c` and elapsed hours `h`:
//!
//! | Status | Adjusted |
//! |--------|----------|
//! | success | `min(1.0, c + 0.1 * (h < 1 ? 1.0 : 0.8))`, floored at 0.1 |
//! | failed | `max(0.1, c - 0.3)` |
//! | partial | `max(0.3, c - 0.1)` |
//! | reversed | `max(0.1, c - 0.4)` |
//! | unknown | `c` |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Outcome records and the confidence adjustment policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::choice::{ChoiceId, Provenance};

const SUCCESS_BOOST: f64 = 0.1;
const SLOW_SUCCESS_FACTOR: f64 = 0.8;
const FAST_SUCCESS_HOURS: f64 = 1.0;
const FAILURE_PENALTY: f64 = 0.3;
const PARTIAL_PENALTY: f64 = 0.1;
const REVERSAL_PENALTY: f64 = 0.4;
const CONFIDENCE_FLOOR: f64 = 0.1;
const PARTIAL_FLOOR: f64 = 0.3;
const PARTIAL_REVISE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Partial,
    Failed,
    Unknown,
    Reversed,
}

impl OutcomeStatus {
    pub const ALL: [OutcomeStatus; 5] = [
        Self::Success,
        Self::Partial,
        Self::Failed,
        Self::Unknown,
        Self::Reversed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
            Self::Reversed => "reversed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" | "failure" => Ok(Self::Failed),
            "unknown" => Ok(Self::Unknown),
            "reversed" => Ok(Self::Reversed),
            other => Err(format!(
                "unknown outcome status '{other}' (expected success, partial, failed, unknown or reversed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    Auto,
    Manual,
    Implicit,
}

/// Outcome report submitted for a previously made choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub status: OutcomeStatus,
    #[serde(default = "default_validation_method")]
    pub validation_method: ValidationMethod,
    #[serde(default)]
    pub success_signals: Vec<String>,
    #[serde(default)]
    pub failure_signals: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn default_validation_method() -> ValidationMethod {
    ValidationMethod::Manual
}

impl OutcomeReport {
    pub fn manual(status: OutcomeStatus) -> Self {
        Self {
            status,
            validation_method: ValidationMethod::Manual,
            success_signals: Vec::new(),
            failure_signals: Vec::new(),
            feedback: None,
        }
    }

    pub fn with_success_signals(mut self, signals: Vec<String>) -> Self {
        self.success_signals = signals;
        self
    }

    pub fn with_failure_signals(mut self, signals: Vec<String>) -> Self {
        self.failure_signals = signals;
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_method(mut self, method: ValidationMethod) -> Self {
        self.validation_method = method;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub choice_id: ChoiceId,
    pub question: String,
    pub answer: String,
    pub provenance: Provenance,
    pub original_confidence: f64,
    pub status: OutcomeStatus,
    pub validation_method: ValidationMethod,
    pub validated_at: DateTime<Utc>,
    pub elapsed_hours: f64,
    pub success_signals: Vec<String>,
    pub failure_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub adjusted_confidence: f64,
    pub knowledge_update: String,
    pub should_revise: bool,
    /// True only when a stored answer was reinforced or revised. False for
    /// statuses that leave knowledge alone and when no answer is stored.
    #[serde(default)]
    pub knowledge_updated: bool,
}

impl Outcome {
    pub fn confidence_delta(&self) -> f64 {
        self.adjusted_confidence - self.original_confidence
    }
}

/// Compute the adjusted confidence for an outcome.
pub fn adjust_confidence(status: OutcomeStatus, original: f64, elapsed_hours: f64) -> f64 {
    match status {
        OutcomeStatus::Success => {
            let factor = if elapsed_hours < FAST_SUCCESS_HOURS {
                1.0
            } else {
                SLOW_SUCCESS_FACTOR
            };
            (original + SUCCESS_BOOST * factor).clamp(CONFIDENCE_FLOOR, 1.0)
        }
        OutcomeStatus::Failed => (original - FAILURE_PENALTY).max(CONFIDENCE_FLOOR),
        OutcomeStatus::Partial => (original - PARTIAL_PENALTY).max(PARTIAL_FLOOR),
        OutcomeStatus::Reversed => (original - REVERSAL_PENALTY).max(CONFIDENCE_FLOOR),
        OutcomeStatus::Unknown => original,
    }
}

/// Failures always revise; a partial outcome only revises a confident answer.
pub fn should_revise(status: OutcomeStatus, original_confidence: f64) -> bool {
    match status {
        OutcomeStatus::Failed => true,
        OutcomeStatus::Partial => original_confidence > PARTIAL_REVISE_THRESHOLD,
        _ => false,
    }
}

/// Human-readable learning generated for an outcome.
pub fn knowledge_update_text(
    status: OutcomeStatus,
    question: &str,
    answer: &str,
    failure_signals: &[String],
    feedback: Option<&str>,
) -> String {
    match status {
        OutcomeStatus::Success => format!("Answer '{answer}' confirmed successful for: {question}"),
        OutcomeStatus::Failed => format!(
            "Answer '{answer}' failed for: {question}. Issues: {}",
            failure_signals.join(", ")
        ),
        OutcomeStatus::Partial => {
            format!("Answer '{answer}' partially worked for: {question}. Needs refinement.")
        }
        OutcomeStatus::Reversed => format!(
            "Answer '{answer}' was reversed by user. Feedback: {}",
            feedback.unwrap_or_default()
        ),
        OutcomeStatus::Unknown => format!("Outcome pending validation for: {question}"),
    }
}
