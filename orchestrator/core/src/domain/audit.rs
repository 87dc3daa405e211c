// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Audit Review
//!
//! Post-hoc scoring of a finalized [`Choice`]. Checks only apply to answers
//! produced by the decision engine; learned and human answers are never
//! flagged. The verdict is evaluated in order:
//!
//! 1. confidence >= 0.8 and no concerns → approved
//! 2. confidence >= 0.6 and at most one concern → approved
//! 3. provenance is `human` → approved
//! 4. three or more concerns, or confidence < 0.5 → risky
//! 5. otherwise → questionable
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Audit verdict computation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::choice::{Choice, ChoiceId, Provenance};

const LOW_CONFIDENCE: f64 = 0.7;
const MIN_SOURCES: usize = 2;
const HIGH_CONFIDENCE: f64 = 0.8;
const ACCEPTABLE_CONFIDENCE: f64 = 0.6;
const RISKY_CONFIDENCE: f64 = 0.5;
const RISKY_CONCERNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerdict {
    Approved,
    Questionable,
    Risky,
}

impl AuditVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Questionable => "questionable",
            Self::Risky => "risky",
        }
    }
}

impl fmt::Display for AuditVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReview {
    pub choice_id: ChoiceId,
    pub verdict: AuditVerdict,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Review a finalized choice.
pub fn review(choice: &Choice) -> AuditReview {
    review_at(choice, Utc::now())
}

pub fn review_at(choice: &Choice, reviewed_at: DateTime<Utc>) -> AuditReview {
    let mut concerns = Vec::new();
    let mut recommendations = Vec::new();
    let engine_made = choice.provenance == Provenance::DecisionEngine;

    if engine_made && choice.confidence < LOW_CONFIDENCE {
        concerns.push(format!(
            "Low confidence ({:.0}%) - may need human review",
            choice.confidence * 100.0
        ));
        recommendations.push("Consider gathering more information before proceeding".to_string());
    }

    if engine_made && choice.consulted_sources.len() < MIN_SOURCES {
        concerns.push("Fewer than two sources consulted - may lack perspective".to_string());
        recommendations.push("Consult additional sources for validation".to_string());
    }

    if engine_made && choice.alternatives.is_empty() {
        concerns.push("No alternatives considered".to_string());
        recommendations.push("Document why alternatives were not evaluated".to_string());
    }

    let verdict = verdict_for(choice.confidence, choice.provenance, concerns.len());

    if verdict == AuditVerdict::Approved {
        recommendations.push("Proceed with implementation".to_string());
        recommendations.push("Monitor outcomes for validation".to_string());
    }

    AuditReview {
        choice_id: choice.id,
        verdict,
        concerns,
        recommendations,
        reviewed_at,
    }
}

fn verdict_for(confidence: f64, provenance: Provenance, concern_count: usize) -> AuditVerdict {
    if confidence >= HIGH_CONFIDENCE && concern_count == 0 {
        AuditVerdict::Approved
    } else if confidence >= ACCEPTABLE_CONFIDENCE && concern_count <= 1 {
        AuditVerdict::Approved
    } else if provenance == Provenance::Human {
        AuditVerdict::Approved
    } else if concern_count >= RISKY_CONCERNS || confidence < RISKY_CONFIDENCE {
        AuditVerdict::Risky
    } else {
        AuditVerdict::Questionable
    }
}
