// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Question Loop - Application Layer
//!
//! The orchestrating facade. For each question:
//!
//! ```text
//! LOOKUP ─ hit ──────────────────────────────────────────────► LOG ─► DONE
//!    │
//!    └ miss ─► CLASSIFY ─► DECIDE ─┬─ conf >= threshold ─► PERSIST ─► LOG ─► AUDIT ─► DONE
//!                                  └─ conf <  threshold ─► ESCALATE ─┘
//! ```
//!
//! Only the knowledge upsert of a freshly decided answer can fail the
//! pipeline. Logging, auditing and event publication log and carry on.
//!
//! Statistics are held per instance, so independent loops in one process
//! (e.g. tests) never share counters.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Question pipeline, outcome reporting, auto-validation, reports

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::application::audit_service::AuditService;
use crate::application::outcome_processor::OutcomeProcessor;
use crate::application::reports::{render_audit_report, EffectivenessReport};
use crate::domain::audit::AuditReview;
use crate::domain::choice::{Choice, ChoiceId, ChoiceLogEntry, Provenance};
use crate::domain::classifier::QuestionClassifier;
use crate::domain::decision::{ChoiceMaker, DecisionError};
use crate::domain::escalation::{apply_response, EscalationResponse, Escalator};
use crate::domain::events::QuestionEvent;
use crate::domain::knowledge::LearnedAnswer;
use crate::domain::outcome::{Outcome, OutcomeReport, OutcomeStatus, ValidationMethod};
use crate::domain::question::{Classification, Fingerprint};
use crate::domain::repository::{
    AuditLedgerRepository, ChoiceLogRepository, KnowledgeRepository, OutcomeRepository,
    RepositoryError,
};
use crate::domain::signals::{ImplicitSignalDetector, StabilityDetector};
use crate::domain::stats::PipelineStats;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::{
    InMemoryAuditLedgerRepository, InMemoryChoiceLogRepository, InMemoryKnowledgeRepository,
    InMemoryOutcomeRepository,
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MAX_AGE_HOURS: f64 = 24.0;

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("Choice not found: {0}")]
    NotFound(ChoiceId),

    #[error("Decision failed: {0}")]
    Decision(#[from] DecisionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The four stores a loop runs against
#[derive(Clone)]
pub struct LoopStores {
    pub knowledge: Arc<dyn KnowledgeRepository>,
    pub choice_log: Arc<dyn ChoiceLogRepository>,
    pub outcomes: Arc<dyn OutcomeRepository>,
    pub audit_ledger: Arc<dyn AuditLedgerRepository>,
}

impl LoopStores {
    pub fn in_memory() -> Self {
        Self {
            knowledge: Arc::new(InMemoryKnowledgeRepository::new()),
            choice_log: Arc::new(InMemoryChoiceLogRepository::new()),
            outcomes: Arc::new(InMemoryOutcomeRepository::new()),
            audit_ledger: Arc::new(InMemoryAuditLedgerRepository::new()),
        }
    }
}

/// Start of a look-back window of `hours` ending at `now`.
///
/// Windows reaching past the representable range start at the earliest
/// representable instant.
fn window_start(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    let millis = hours.max(0.0) * 3_600_000.0;
    if !millis.is_finite() || millis >= i64::MAX as f64 {
        return DateTime::<Utc>::MIN_UTC;
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Answer returned for a submitted question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub choice_id: ChoiceId,
    pub chosen_option: String,
    pub confidence: f64,
    pub provenance: Provenance,
    pub reasoning: String,
    pub consulted_sources: Vec<String>,
    pub alternatives: Vec<String>,
    pub cache_hit: bool,
    /// Usage counter after this hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditReview>,
    pub stats: PipelineStats,
}

impl SubmitResponse {
    fn new(choice: Choice, cache_hit: bool, stats: PipelineStats) -> Self {
        Self {
            choice_id: choice.id,
            chosen_option: choice.chosen_option,
            confidence: choice.confidence,
            provenance: choice.provenance,
            reasoning: choice.reasoning,
            consulted_sources: choice.consulted_sources,
            alternatives: choice.alternatives,
            cache_hit,
            times_used: None,
            classification: None,
            escalation: None,
            audit: None,
            stats,
        }
    }
}

/// Result of reporting an outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReceipt {
    pub choice_id: ChoiceId,
    pub status: OutcomeStatus,
    pub original_confidence: f64,
    pub adjusted_confidence: f64,
    pub confidence_delta: f64,
    pub should_revise: bool,
    /// Set only when the stored answer for this question was reinforced or
    /// revised. Unknown and Reversed outcomes, low-confidence partials and
    /// questions with no stored answer leave it false.
    pub knowledge_updated: bool,
    pub learnings: String,
}

impl From<&Outcome> for OutcomeReceipt {
    fn from(outcome: &Outcome) -> Self {
        Self {
            choice_id: outcome.choice_id,
            status: outcome.status,
            original_confidence: outcome.original_confidence,
            adjusted_confidence: outcome.adjusted_confidence,
            confidence_delta: outcome.confidence_delta(),
            should_revise: outcome.should_revise,
            knowledge_updated: outcome.knowledge_updated,
            learnings: outcome.knowledge_update.clone(),
        }
    }
}

/// Counts from one auto-validation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoValidationSummary {
    pub total_validated: u64,
    pub success: u64,
    pub partial: u64,
    pub failed: u64,
    pub unknown: u64,
    pub reversed: u64,
    pub knowledge_updates: u64,
}

impl AutoValidationSummary {
    fn record(&mut self, receipt: &OutcomeReceipt) {
        self.total_validated += 1;
        match receipt.status {
            OutcomeStatus::Success => self.success += 1,
            OutcomeStatus::Partial => self.partial += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Unknown => self.unknown += 1,
            OutcomeStatus::Reversed => self.reversed += 1,
        }
        if receipt.knowledge_updated {
            self.knowledge_updates += 1;
        }
    }
}

pub struct QuestionLoop {
    classifier: QuestionClassifier,
    choice_maker: Arc<dyn ChoiceMaker>,
    escalator: Arc<dyn Escalator>,
    stores: LoopStores,
    audit: AuditService,
    outcome_processor: OutcomeProcessor,
    detector: Arc<dyn ImplicitSignalDetector>,
    event_bus: Arc<EventBus>,
    threshold: f64,
    max_age_hours: f64,
    stats: Mutex<PipelineStats>,
}

impl QuestionLoop {
    pub fn new(
        choice_maker: Arc<dyn ChoiceMaker>,
        escalator: Arc<dyn Escalator>,
        stores: LoopStores,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let audit = AuditService::new(stores.audit_ledger.clone(), event_bus.clone());
        let outcome_processor = OutcomeProcessor::new(
            stores.choice_log.clone(),
            stores.knowledge.clone(),
            stores.outcomes.clone(),
            event_bus.clone(),
        );

        Self {
            classifier: QuestionClassifier::new(),
            choice_maker,
            escalator,
            stores,
            audit,
            outcome_processor,
            detector: Arc::new(StabilityDetector::default()),
            event_bus,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    /// Escalate candidates strictly below `threshold`
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn ImplicitSignalDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Default window for [`auto_validate`](Self::auto_validate)
    pub fn with_max_age_hours(mut self, hours: f64) -> Self {
        self.max_age_hours = hours;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn stats(&self) -> PipelineStats {
        *self.stats.lock()
    }

    pub async fn submit_question(&self, question: &str) -> Result<SubmitResponse, LoopError> {
        self.stats.lock().record_question();
        let fingerprint = Fingerprint::of(question);

        if let Some(learned) = self.stores.knowledge.lookup(&fingerprint).await? {
            return Ok(self.answer_from_cache(question, &fingerprint, learned).await);
        }

        let classification = self.classifier.classify(question);
        debug!(
            fingerprint = %fingerprint,
            category = classification.category.as_str(),
            confidence = classification.confidence,
            "Question classified"
        );

        let candidate = self.choice_maker.decide(question, &classification).await?;
        self.stats.lock().record_decision();
        info!(
            choice_id = %candidate.id,
            strategy = self.choice_maker.name(),
            option = %candidate.chosen_option,
            confidence = candidate.confidence,
            "Candidate decided"
        );

        let (choice, escalation) = if candidate.confidence < self.threshold {
            self.stats.lock().record_escalation();
            let candidate_confidence = candidate.confidence;
            let response = self.escalator.escalate(&candidate, &classification).await;
            info!(
                choice_id = %candidate.id,
                candidate_confidence,
                threshold = self.threshold,
                response = ?response,
                "Candidate escalated"
            );
            self.event_bus.publish_question_event(QuestionEvent::QuestionEscalated {
                choice_id: candidate.id,
                category: classification.category,
                candidate_confidence,
                response: response.clone(),
                escalated_at: Utc::now(),
            });
            (apply_response(candidate, &response), Some(response))
        } else {
            (candidate, None)
        };

        self.stores.knowledge.upsert(&choice).await?;

        if let Err(e) = self
            .stores
            .choice_log
            .append(&ChoiceLogEntry::new(choice.clone(), false))
            .await
        {
            error!(choice_id = %choice.id, error = %e, "Failed to log choice");
        }

        let review = self.audit.audit(&choice).await;

        self.publish_answered(&choice, &fingerprint, false);

        let mut response = SubmitResponse::new(choice, false, self.stats());
        response.classification = Some(classification);
        response.escalation = escalation;
        response.audit = Some(review);
        Ok(response)
    }

    async fn answer_from_cache(
        &self,
        question: &str,
        fingerprint: &Fingerprint,
        learned: LearnedAnswer,
    ) -> SubmitResponse {
        self.stats.lock().record_cache_hit();

        let choice = Choice {
            id: ChoiceId::new(),
            question: question.to_string(),
            chosen_option: learned.chosen_option,
            reasoning: learned.reasoning,
            confidence: learned.confidence,
            consulted_sources: learned.consulted_sources,
            alternatives: learned.alternatives,
            created_at: Utc::now(),
            provenance: Provenance::Learned,
        };

        info!(
            choice_id = %choice.id,
            fingerprint = %fingerprint,
            times_used = learned.times_used,
            "Answered from knowledge base"
        );

        if let Err(e) = self
            .stores
            .choice_log
            .append(&ChoiceLogEntry::new(choice.clone(), true))
            .await
        {
            warn!(choice_id = %choice.id, error = %e, "Failed to log cache hit");
        }

        self.publish_answered(&choice, fingerprint, true);

        let mut response = SubmitResponse::new(choice, true, self.stats());
        response.times_used = Some(learned.times_used);
        response
    }

    fn publish_answered(&self, choice: &Choice, fingerprint: &Fingerprint, cache_hit: bool) {
        self.event_bus.publish_question_event(QuestionEvent::QuestionAnswered {
            choice_id: choice.id,
            fingerprint: fingerprint.clone(),
            provenance: choice.provenance,
            confidence: choice.confidence,
            cache_hit,
            answered_at: Utc::now(),
        });
    }

    pub async fn report_outcome(&self, choice_id: ChoiceId, report: OutcomeReport) -> Result<OutcomeReceipt, LoopError> {
        let outcome = self.outcome_processor.process_outcome(choice_id, report).await?;
        self.stats.lock().record_outcome(outcome.knowledge_updated);
        Ok(OutcomeReceipt::from(&outcome))
    }

    /// Validate recent choices from implicit signals.
    ///
    /// `max_age_hours` defaults to the configured window.
    pub async fn auto_validate(&self, max_age_hours: Option<f64>) -> Result<AutoValidationSummary, LoopError> {
        self.auto_validate_at(max_age_hours, Utc::now()).await
    }

    pub async fn auto_validate_at(
        &self,
        max_age_hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<AutoValidationSummary, LoopError> {
        let hours = max_age_hours.unwrap_or(self.max_age_hours).max(0.0);
        let since = window_start(now, hours);
        let entries = self.stores.choice_log.find_since(since).await?;

        let mut summary = AutoValidationSummary::default();
        for entry in entries {
            if self.stores.outcomes.contains(entry.choice.id).await? {
                continue;
            }

            let success_signals = self.detector.detect_success(&entry, now);
            let failure_signals = self.detector.detect_failure(&entry, now);
            let status = if !failure_signals.is_empty() {
                OutcomeStatus::Failed
            } else if !success_signals.is_empty() {
                OutcomeStatus::Success
            } else {
                continue;
            };

            let report = OutcomeReport::manual(status)
                .with_method(ValidationMethod::Auto)
                .with_success_signals(success_signals)
                .with_failure_signals(failure_signals);

            let outcome = self
                .outcome_processor
                .process_outcome_at(entry.choice.id, report, now)
                .await?;
            self.stats.lock().record_outcome(outcome.knowledge_updated);
            summary.record(&OutcomeReceipt::from(&outcome));
        }

        info!(
            validated = summary.total_validated,
            success = summary.success,
            failed = summary.failed,
            window_hours = hours,
            "Auto-validation complete"
        );
        Ok(summary)
    }

    pub async fn audit_report(&self) -> Result<String, LoopError> {
        let reviews = self.audit.reviews().await?;
        let log = self.stores.choice_log.list_all().await?;
        Ok(render_audit_report(&reviews, &log, Utc::now()))
    }

    pub async fn effectiveness(&self) -> Result<EffectivenessReport, LoopError> {
        let outcomes = self.stores.outcomes.list_all().await?;
        Ok(EffectivenessReport::from_outcomes(&outcomes))
    }

    pub async fn effectiveness_report(&self) -> Result<String, LoopError> {
        Ok(self.effectiveness().await?.render(Utc::now()))
    }

    /// Learned answer for a question, without counting a use
    pub async fn learned_answer(&self, question: &str) -> Result<Option<LearnedAnswer>, LoopError> {
        Ok(self.stores.knowledge.get(&Fingerprint::of(question)).await?)
    }

    pub async fn learned_answers(&self) -> Result<Vec<LearnedAnswer>, LoopError> {
        Ok(self.stores.knowledge.list_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start() {
        let now = Utc::now();
        assert_eq!(window_start(now, 2.0), now - Duration::hours(2));
        assert_eq!(window_start(now, -1.0), now);
        assert_eq!(window_start(now, 1e12), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now, f64::INFINITY), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now, f64::NAN), now);
    }
}
