// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Escalation
//!
//! When a candidate choice falls below the confidence threshold the question
//! loop hands it to an [`Escalator`]: an external authority that approves,
//! overrides or defers. Escalators never fail. Anything that prevents a
//! response (no input, interrupt, timeout, disconnect) is a
//! [`EscalationResponse::Defer`], so the best-effort answer is used instead of
//! blocking the pipeline.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Escalation port and response semantics

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::choice::{Choice, Provenance};
use crate::domain::question::Classification;

pub const APPROVED_CONFIDENCE: f64 = 0.95;
pub const OVERRIDE_CONFIDENCE: f64 = 1.0;

/// Response from an external authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "answer", rename_all = "snake_case")]
pub enum EscalationResponse {
    /// Accept the candidate as-is
    Approve,
    /// Replace the chosen option
    Override(String),
    /// No response; keep the best guess
    Defer,
}

/// Escalation port consumed by the question loop
#[async_trait]
pub trait Escalator: Send + Sync {
    /// Ask an authority about a low-confidence candidate.
    async fn escalate(&self, choice: &Choice, classification: &Classification) -> EscalationResponse;
}

/// Apply an authority's response to the candidate.
pub fn apply_response(mut choice: Choice, response: &EscalationResponse) -> Choice {
    match response {
        EscalationResponse::Approve => {
            choice.provenance = Provenance::HumanApproved;
            choice.confidence = APPROVED_CONFIDENCE;
            choice.reasoning.push_str(" [Human approved this choice]");
        }
        EscalationResponse::Override(answer) => {
            let answer = answer.trim();
            choice.provenance = Provenance::Human;
            choice.confidence = OVERRIDE_CONFIDENCE;
            choice.chosen_option = answer.to_string();
            choice.reasoning = format!("Human decision: {answer}");
        }
        EscalationResponse::Defer => {}
    }
    choice
}

impl EscalationResponse {
    /// Interpret one line of free-text input from a human.
    ///
    /// `yes`/`y` approves, `skip` or an empty line defers, anything else is
    /// taken as the replacement answer.
    pub fn from_line(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "skip" => Self::Defer,
            "yes" | "y" => Self::Approve,
            _ => Self::Override(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Choice {
        Choice::new("Adopt the experimental tech?", "Proceed with caution", "Limited data", 0.45)
            .with_sources(["Architecture"])
    }

    #[test]
    fn test_approve_raises_confidence_and_annotates() {
        let original = candidate();
        let approved = apply_response(original.clone(), &EscalationResponse::Approve);
        assert_eq!(approved.id, original.id);
        assert_eq!(approved.provenance, Provenance::HumanApproved);
        assert_eq!(approved.confidence, 0.95);
        assert_eq!(approved.chosen_option, "Proceed with caution");
        assert_eq!(approved.reasoning, "Limited data [Human approved this choice]");
    }

    #[test]
    fn test_override_replaces_answer() {
        let overridden = apply_response(
            candidate(),
            &EscalationResponse::Override("  Wait for v2  ".to_string()),
        );
        assert_eq!(overridden.provenance, Provenance::Human);
        assert_eq!(overridden.confidence, 1.0);
        assert_eq!(overridden.chosen_option, "Wait for v2");
        assert_eq!(overridden.reasoning, "Human decision: Wait for v2");
    }

    #[test]
    fn test_defer_keeps_candidate() {
        let original = candidate();
        assert_eq!(apply_response(original.clone(), &EscalationResponse::Defer), original);
    }

    #[test]
    fn test_from_line() {
        assert_eq!(EscalationResponse::from_line("YES\n"), EscalationResponse::Approve);
        assert_eq!(EscalationResponse::from_line("  "), EscalationResponse::Defer);
        assert_eq!(EscalationResponse::from_line("skip"), EscalationResponse::Defer);
        assert_eq!(
            EscalationResponse::from_line("Use SQLite\n"),
            EscalationResponse::Override("Use SQLite".to_string())
        );
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(EscalationResponse::Override("A".into())).unwrap();
        assert_eq!(json, serde_json::json!({"action": "override", "answer": "A"}));
        let json = serde_json::to_value(EscalationResponse::Defer).unwrap();
        assert_eq!(json, serde_json::json!({"action": "defer"}));
    }
}
