// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::audit::AuditVerdict;
use crate::domain::choice::{ChoiceId, Provenance};
use crate::domain::escalation::EscalationResponse;
use crate::domain::outcome::OutcomeStatus;
use crate::domain::question::{Fingerprint, QuestionCategory};

/// Question pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuestionEvent {
    QuestionAnswered {
        choice_id: ChoiceId,
        fingerprint: Fingerprint,
        provenance: Provenance,
        confidence: f64,
        cache_hit: bool,
        answered_at: DateTime<Utc>,
    },
    QuestionEscalated {
        choice_id: ChoiceId,
        category: QuestionCategory,
        candidate_confidence: f64,
        response: EscalationResponse,
        escalated_at: DateTime<Utc>,
    },
    ChoiceAudited {
        choice_id: ChoiceId,
        verdict: AuditVerdict,
        concern_count: usize,
        audited_at: DateTime<Utc>,
    },
}

/// Outcome feedback and knowledge evolution events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LearningEvent {
    OutcomeRecorded {
        choice_id: ChoiceId,
        status: OutcomeStatus,
        original_confidence: f64,
        adjusted_confidence: f64,
        recorded_at: DateTime<Utc>,
    },
    KnowledgeReinforced {
        fingerprint: Fingerprint,
        confidence: f64,
        success_count: u64,
        reinforced_at: DateTime<Utc>,
    },
    KnowledgeRevised {
        fingerprint: Fingerprint,
        confidence: f64,
        failure_count: usize,
        revised_at: DateTime<Utc>,
    },
}
