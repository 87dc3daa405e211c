// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outcome Processor - Application Layer
//!
//! Turns an outcome report for a logged choice into an [`Outcome`], applies
//! the confidence adjustment to the learned answer and stores the outcome.
//!
//! Order of effects for one report:
//!
//! 1. Resolve the choice from the log (unknown id fails before any write)
//! 2. Revise or reinforce the learned answer for the question's fingerprint
//! 3. Save the outcome keyed by choice id, overwriting any earlier report
//! 4. Publish learning events
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Outcome-driven learning

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::application::question_loop::LoopError;
use crate::domain::choice::ChoiceId;
use crate::domain::events::LearningEvent;
use crate::domain::knowledge::FailureRecord;
use crate::domain::outcome::{
    adjust_confidence, knowledge_update_text, should_revise, Outcome, OutcomeReport, OutcomeStatus,
};
use crate::domain::question::Fingerprint;
use crate::domain::repository::{ChoiceLogRepository, KnowledgeRepository, OutcomeRepository};
use crate::infrastructure::event_bus::EventBus;

pub struct OutcomeProcessor {
    choice_log: Arc<dyn ChoiceLogRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    outcomes: Arc<dyn OutcomeRepository>,
    event_bus: Arc<EventBus>,
}

impl OutcomeProcessor {
    pub fn new(
        choice_log: Arc<dyn ChoiceLogRepository>,
        knowledge: Arc<dyn KnowledgeRepository>,
        outcomes: Arc<dyn OutcomeRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            choice_log,
            knowledge,
            outcomes,
            event_bus,
        }
    }

    pub async fn process_outcome(&self, choice_id: ChoiceId, report: OutcomeReport) -> Result<Outcome, LoopError> {
        self.process_outcome_at(choice_id, report, Utc::now()).await
    }

    /// Process a report as if validated at `now`
    pub async fn process_outcome_at(
        &self,
        choice_id: ChoiceId,
        report: OutcomeReport,
        now: DateTime<Utc>,
    ) -> Result<Outcome, LoopError> {
        let entry = self
            .choice_log
            .find_by_id(choice_id)
            .await?
            .ok_or(LoopError::NotFound(choice_id))?;
        let choice = entry.choice;

        let elapsed_hours = choice.elapsed_hours(now);
        let adjusted_confidence = adjust_confidence(report.status, choice.confidence, elapsed_hours);
        let revise = should_revise(report.status, choice.confidence);
        let fingerprint = Fingerprint::of(&choice.question);

        let knowledge_updated = if revise {
            let failure = FailureRecord {
                recorded_at: now,
                failure_signals: report.failure_signals.clone(),
                feedback: report.feedback.clone(),
            };
            match self
                .knowledge
                .mark_failure(&fingerprint, adjusted_confidence, failure)
                .await?
            {
                Some(answer) => {
                    info!(
                        fingerprint = %fingerprint,
                        confidence = answer.confidence,
                        failures = answer.failure_history.len(),
                        "Learned answer revised"
                    );
                    self.event_bus.publish_learning_event(LearningEvent::KnowledgeRevised {
                        fingerprint: fingerprint.clone(),
                        confidence: answer.confidence,
                        failure_count: answer.failure_history.len(),
                        revised_at: now,
                    });
                    true
                }
                None => false,
            }
        } else if report.status == OutcomeStatus::Success {
            match self
                .knowledge
                .reinforce(&fingerprint, adjusted_confidence, now)
                .await?
            {
                Some(answer) => {
                    info!(
                        fingerprint = %fingerprint,
                        confidence = answer.confidence,
                        successes = answer.success_count,
                        "Learned answer reinforced"
                    );
                    self.event_bus.publish_learning_event(LearningEvent::KnowledgeReinforced {
                        fingerprint: fingerprint.clone(),
                        confidence: answer.confidence,
                        success_count: answer.success_count,
                        reinforced_at: now,
                    });
                    true
                }
                None => false,
            }
        } else {
            false
        };

        if (revise || report.status == OutcomeStatus::Success) && !knowledge_updated {
            warn!(
                choice_id = %choice_id,
                fingerprint = %fingerprint,
                "No learned answer for outcome; knowledge unchanged"
            );
        }

        let knowledge_update = knowledge_update_text(
            report.status,
            &choice.question,
            &choice.chosen_option,
            &report.failure_signals,
            report.feedback.as_deref(),
        );

        let outcome = Outcome {
            choice_id,
            question: choice.question,
            answer: choice.chosen_option,
            provenance: choice.provenance,
            original_confidence: choice.confidence,
            status: report.status,
            validation_method: report.validation_method,
            validated_at: now,
            elapsed_hours,
            success_signals: report.success_signals,
            failure_signals: report.failure_signals,
            feedback: report.feedback,
            adjusted_confidence,
            knowledge_update,
            should_revise: revise,
            knowledge_updated,
        };

        self.outcomes.save(&outcome).await?;

        metrics::counter!("answerloop_outcomes_total", "status" => outcome.status.as_str()).increment(1);
        info!(
            choice_id = %choice_id,
            status = %outcome.status,
            original_confidence = outcome.original_confidence,
            adjusted_confidence = outcome.adjusted_confidence,
            "Outcome recorded"
        );

        self.event_bus.publish_learning_event(LearningEvent::OutcomeRecorded {
            choice_id,
            status: outcome.status,
            original_confidence: outcome.original_confidence,
            adjusted_confidence: outcome.adjusted_confidence,
            recorded_at: now,
        });

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::{Choice, ChoiceLogEntry};
    use crate::infrastructure::repositories::{
        InMemoryChoiceLogRepository, InMemoryKnowledgeRepository, InMemoryOutcomeRepository,
    };
    use chrono::Duration;

    struct Fixture {
        processor: OutcomeProcessor,
        knowledge: InMemoryKnowledgeRepository,
        outcomes: InMemoryOutcomeRepository,
        choice: Choice,
    }

    async fn fixture(confidence: f64) -> Fixture {
        let choice_log = InMemoryChoiceLogRepository::new();
        let knowledge = InMemoryKnowledgeRepository::new();
        let outcomes = InMemoryOutcomeRepository::new();

        let choice = Choice::new("Should we use MongoDB or PostgreSQL?", "PostgreSQL", "r", confidence);
        knowledge.upsert(&choice).await.unwrap();
        choice_log.append(&ChoiceLogEntry::new(choice.clone(), false)).await.unwrap();

        let processor = OutcomeProcessor::new(
            Arc::new(choice_log),
            Arc::new(knowledge.clone()),
            Arc::new(outcomes.clone()),
            Arc::new(EventBus::with_default_capacity()),
        );
        Fixture {
            processor,
            knowledge,
            outcomes,
            choice,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn test_success_reinforces() {
        let f = fixture(0.85).await;
        let now = f.choice.created_at + Duration::minutes(10);

        let outcome = f
            .processor
            .process_outcome_at(f.choice.id, OutcomeReport::manual(OutcomeStatus::Success), now)
            .await
            .unwrap();

        assert!(approx(outcome.adjusted_confidence, 0.95));
        assert!(outcome.knowledge_updated);

        let learned = f.knowledge.get(&Fingerprint::of(&f.choice.question)).await.unwrap().unwrap();
        assert!(approx(learned.confidence, 0.95));
        assert_eq!(learned.success_count, 1);
        assert_eq!(learned.last_success, Some(now));
    }

    #[tokio::test]
    async fn test_slow_success_earns_smaller_boost() {
        let f = fixture(0.85).await;
        let now = f.choice.created_at + Duration::hours(2);
        let outcome = f
            .processor
            .process_outcome_at(f.choice.id, OutcomeReport::manual(OutcomeStatus::Success), now)
            .await
            .unwrap();
        assert!(approx(outcome.adjusted_confidence, 0.93));
    }

    #[tokio::test]
    async fn test_failure_revises_and_keeps_history() {
        let f = fixture(0.85).await;
        let report = OutcomeReport::manual(OutcomeStatus::Failed)
            .with_failure_signals(vec!["Migration failed".to_string()])
            .with_feedback("Schema mismatch");

        let outcome = f.processor.process_outcome(f.choice.id, report.clone()).await.unwrap();
        assert!(outcome.should_revise);
        assert!(approx(outcome.adjusted_confidence, 0.55));
        assert!(outcome.knowledge_update.ends_with("Issues: Migration failed"));

        f.processor.process_outcome(f.choice.id, report).await.unwrap();

        let learned = f.knowledge.get(&Fingerprint::of(&f.choice.question)).await.unwrap().unwrap();
        assert!(learned.needs_review);
        assert_eq!(learned.failure_history.len(), 2);
        assert_eq!(learned.failure_history[0].feedback.as_deref(), Some("Schema mismatch"));

        // Outcomes overwrite per choice
        assert_eq!(f.outcomes.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_revision_depends_on_original_confidence() {
        let low = fixture(0.5).await;
        let outcome = low
            .processor
            .process_outcome(low.choice.id, OutcomeReport::manual(OutcomeStatus::Partial))
            .await
            .unwrap();
        assert!(!outcome.should_revise);
        assert!(!outcome.knowledge_updated);

        let high = fixture(0.8).await;
        let outcome = high
            .processor
            .process_outcome(high.choice.id, OutcomeReport::manual(OutcomeStatus::Partial))
            .await
            .unwrap();
        assert!(outcome.should_revise);
        assert!(outcome.knowledge_updated);
    }

    #[tokio::test]
    async fn test_missing_learned_answer_is_not_an_update() {
        let choice_log = InMemoryChoiceLogRepository::new();
        let knowledge = InMemoryKnowledgeRepository::new();
        let choice = Choice::new("Should we use MongoDB or PostgreSQL?", "PostgreSQL", "r", 0.85);
        choice_log.append(&ChoiceLogEntry::new(choice.clone(), false)).await.unwrap();

        let processor = OutcomeProcessor::new(
            Arc::new(choice_log),
            Arc::new(knowledge.clone()),
            Arc::new(InMemoryOutcomeRepository::new()),
            Arc::new(EventBus::with_default_capacity()),
        );

        for status in [OutcomeStatus::Success, OutcomeStatus::Failed] {
            let outcome = processor
                .process_outcome(choice.id, OutcomeReport::manual(status))
                .await
                .unwrap();
            assert!(!outcome.knowledge_updated, "{status}");
        }
        assert!(knowledge.get(&Fingerprint::of(&choice.question)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reversed_leaves_knowledge_alone() {
        let f = fixture(0.9).await;
        let outcome = f
            .processor
            .process_outcome(
                f.choice.id,
                OutcomeReport::manual(OutcomeStatus::Reversed).with_feedback("Went with MySQL"),
            )
            .await
            .unwrap();

        assert!(approx(outcome.adjusted_confidence, 0.5));
        assert!(!outcome.knowledge_updated);
        assert_eq!(
            outcome.knowledge_update,
            "Answer 'PostgreSQL' was reversed by user. Feedback: Went with MySQL"
        );
        let learned = f.knowledge.get(&Fingerprint::of(&f.choice.question)).await.unwrap().unwrap();
        assert!(approx(learned.confidence, 0.9));
    }

    #[tokio::test]
    async fn test_unknown_choice_is_not_found_and_writes_nothing() {
        let f = fixture(0.85).await;
        let missing = ChoiceId::new();

        let err = f
            .processor
            .process_outcome(missing, OutcomeReport::manual(OutcomeStatus::Failed))
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::NotFound(id) if id == missing));
        assert!(f.outcomes.list_all().await.unwrap().is_empty());

        let learned = f.knowledge.get(&Fingerprint::of(&f.choice.question)).await.unwrap().unwrap();
        assert!(learned.failure_history.is_empty());
    }
}
