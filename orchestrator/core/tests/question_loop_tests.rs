// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use answerloop_core::application::question_loop::{LoopError, LoopStores, QuestionLoop};
use answerloop_core::domain::audit::AuditVerdict;
use answerloop_core::domain::choice::{Choice, ChoiceId, Provenance};
use answerloop_core::domain::decision::{ChoiceMaker, DecisionError, HeuristicChoiceMaker};
use answerloop_core::domain::escalation::{EscalationResponse, Escalator};
use answerloop_core::domain::events::QuestionEvent;
use answerloop_core::domain::outcome::{OutcomeReport, OutcomeStatus};
use answerloop_core::domain::question::Classification;
use answerloop_core::infrastructure::console_escalator::DeferringEscalator;
use answerloop_core::infrastructure::event_bus::{DomainEvent, EventBus};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DB_QUESTION: &str = "Should we use MongoDB or PostgreSQL for user management?";

/// Returns a fixed candidate and counts calls
struct ScriptedChoiceMaker {
    option: String,
    confidence: f64,
    calls: AtomicUsize,
}

impl ScriptedChoiceMaker {
    fn new(option: &str, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            option: option.to_string(),
            confidence,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChoiceMaker for ScriptedChoiceMaker {
    async fn decide(&self, question: &str, _classification: &Classification) -> Result<Choice, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Choice::new(question, self.option.clone(), "Scripted", self.confidence)
            .with_sources(["a", "b", "c"])
            .with_alternatives(["x", "y"]))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Replies with a fixed response and records what it was asked
struct ScriptedEscalator {
    response: EscalationResponse,
    asked: Mutex<Vec<f64>>,
}

impl ScriptedEscalator {
    fn new(response: EscalationResponse) -> Arc<Self> {
        Arc::new(Self {
            response,
            asked: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.asked.lock().len()
    }
}

#[async_trait]
impl Escalator for ScriptedEscalator {
    async fn escalate(&self, choice: &Choice, _classification: &Classification) -> EscalationResponse {
        self.asked.lock().push(choice.confidence);
        self.response.clone()
    }
}

fn build(maker: Arc<dyn ChoiceMaker>, escalator: Arc<dyn Escalator>) -> QuestionLoop {
    QuestionLoop::new(
        maker,
        escalator,
        LoopStores::in_memory(),
        Arc::new(EventBus::with_default_capacity()),
    )
}

#[tokio::test]
async fn test_second_ask_is_answered_from_knowledge_base() {
    let question_loop = build(Arc::new(HeuristicChoiceMaker::default()), Arc::new(DeferringEscalator));

    let first = question_loop.submit_question(DB_QUESTION).await.unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.provenance, Provenance::DecisionEngine);
    assert_eq!(first.chosen_option, "PostgreSQL");
    assert!(first.audit.is_some());

    let second = question_loop.submit_question(DB_QUESTION).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.provenance, Provenance::Learned);
    assert_eq!(second.chosen_option, "PostgreSQL");
    assert_eq!(second.times_used, Some(1));
    assert!(second.audit.is_none());
    assert_ne!(first.choice_id, second.choice_id);
}

#[tokio::test]
async fn test_cache_hits_never_reach_the_choice_maker() {
    let maker = ScriptedChoiceMaker::new("Answer", 0.3);
    let escalator = ScriptedEscalator::new(EscalationResponse::Defer);
    let question_loop = build(maker.clone(), escalator.clone());

    question_loop.submit_question("Which queue should we adopt?").await.unwrap();
    for expected in 1..=3u64 {
        let response = question_loop
            .submit_question("  WHICH queue should we adopt?  ")
            .await
            .unwrap();
        assert_eq!(response.times_used, Some(expected));
    }

    assert_eq!(maker.calls(), 1);
    assert_eq!(escalator.calls(), 1);

    let stats = question_loop.stats();
    assert_eq!(stats.total_questions, 4);
    assert_eq!(stats.cache_hits, 3);
    assert_eq!(stats.decisions_made, 1);
    assert_eq!(stats.escalations, 1);
}

#[tokio::test]
async fn test_escalation_is_strictly_below_threshold() {
    let at_threshold = ScriptedEscalator::new(EscalationResponse::Approve);
    let question_loop = build(ScriptedChoiceMaker::new("A", 0.6), at_threshold.clone());
    let response = question_loop.submit_question("Which cache layer fits?").await.unwrap();
    assert_eq!(at_threshold.calls(), 0);
    assert_eq!(response.provenance, Provenance::DecisionEngine);
    assert!(response.escalation.is_none());

    let below = ScriptedEscalator::new(EscalationResponse::Approve);
    let question_loop = build(ScriptedChoiceMaker::new("A", 0.59), below.clone());
    question_loop.submit_question("Which cache layer fits?").await.unwrap();
    assert_eq!(below.calls(), 1);
}

#[tokio::test]
async fn test_configured_threshold_is_used() {
    let escalator = ScriptedEscalator::new(EscalationResponse::Defer);
    let question_loop =
        build(ScriptedChoiceMaker::new("A", 0.75), escalator.clone()).with_threshold(0.8);
    question_loop.submit_question("Which region should host it?").await.unwrap();
    assert_eq!(escalator.calls(), 1);
}

#[tokio::test]
async fn test_approved_escalation() {
    let question_loop = build(
        ScriptedChoiceMaker::new("Redis", 0.4),
        ScriptedEscalator::new(EscalationResponse::Approve),
    );

    let response = question_loop.submit_question("Which cache should we use?").await.unwrap();
    assert_eq!(response.provenance, Provenance::HumanApproved);
    assert_eq!(response.chosen_option, "Redis");
    assert_eq!(response.confidence, 0.95);
    assert!(response.reasoning.ends_with("[Human approved this choice]"));
    assert_eq!(response.escalation, Some(EscalationResponse::Approve));
}

#[tokio::test]
async fn test_override_becomes_the_cached_answer() {
    let maker = ScriptedChoiceMaker::new("Redis", 0.4);
    let question_loop = build(
        maker.clone(),
        ScriptedEscalator::new(EscalationResponse::Override("Memcached".to_string())),
    );

    let response = question_loop.submit_question("Which cache should we use?").await.unwrap();
    assert_eq!(response.provenance, Provenance::Human);
    assert_eq!(response.chosen_option, "Memcached");
    assert_eq!(response.confidence, 1.0);
    assert_eq!(response.reasoning, "Human decision: Memcached");
    // Human decisions are never second-guessed
    assert_eq!(response.audit.unwrap().verdict, AuditVerdict::Approved);

    let cached = question_loop.submit_question("Which cache should we use?").await.unwrap();
    assert!(cached.cache_hit);
    assert_eq!(cached.chosen_option, "Memcached");
    assert_eq!(cached.confidence, 1.0);
    assert_eq!(maker.calls(), 1);
}

#[tokio::test]
async fn test_deferred_escalation_keeps_best_guess() {
    let question_loop = build(
        ScriptedChoiceMaker::new("Redis", 0.4),
        ScriptedEscalator::new(EscalationResponse::Defer),
    );

    let response = question_loop.submit_question("Which cache should we use?").await.unwrap();
    assert_eq!(response.provenance, Provenance::DecisionEngine);
    assert_eq!(response.chosen_option, "Redis");
    assert_eq!(response.confidence, 0.4);

    let learned = question_loop
        .learned_answer("which cache should we use?")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(learned.confidence, 0.4);
    assert_eq!(learned.times_used, 0);
}

#[tokio::test]
async fn test_one_audit_per_decided_question() {
    let question_loop = build(ScriptedChoiceMaker::new("A", 0.3), Arc::new(DeferringEscalator));

    let response = question_loop.submit_question("Which linter do we standardize on?").await.unwrap();
    let review = response.audit.unwrap();
    assert_eq!(review.choice_id, response.choice_id);
    // Three sources and two alternatives: only the confidence concern applies
    assert_eq!(review.concerns.len(), 1);
    assert_eq!(review.verdict, AuditVerdict::Risky);

    question_loop.submit_question("Which linter do we standardize on?").await.unwrap();
    question_loop.submit_question("Which formatter do we standardize on?").await.unwrap();

    let report = question_loop.audit_report().await.unwrap();
    assert!(report.contains("**Total Choices Reviewed**: 2"));
    assert!(report.contains("**Question**: Which linter do we standardize on?"));
}

#[tokio::test]
async fn test_events_follow_the_pipeline() {
    let bus = Arc::new(EventBus::with_default_capacity());
    let question_loop = QuestionLoop::new(
        ScriptedChoiceMaker::new("A", 0.2),
        ScriptedEscalator::new(EscalationResponse::Defer),
        LoopStores::in_memory(),
        bus.clone(),
    );
    let mut rx = bus.subscribe();

    question_loop.submit_question("Which vendor should we pick?").await.unwrap();

    let kinds: Vec<&'static str> = [
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
    ]
    .iter()
    .map(|event| match event {
        DomainEvent::Question(QuestionEvent::QuestionEscalated { .. }) => "escalated",
        DomainEvent::Question(QuestionEvent::ChoiceAudited { .. }) => "audited",
        DomainEvent::Question(QuestionEvent::QuestionAnswered { .. }) => "answered",
        DomainEvent::Learning(_) => "learning",
    })
    .collect();
    assert_eq!(kinds, vec!["escalated", "audited", "answered"]);
}

#[tokio::test]
async fn test_outcome_for_unknown_choice_is_not_found() {
    let question_loop = build(Arc::new(HeuristicChoiceMaker::default()), Arc::new(DeferringEscalator));
    question_loop.submit_question(DB_QUESTION).await.unwrap();

    let result = question_loop
        .report_outcome(ChoiceId::new(), OutcomeReport::manual(OutcomeStatus::Success))
        .await;
    assert!(matches!(result, Err(LoopError::NotFound(_))));

    let learned = question_loop.learned_answer(DB_QUESTION).await.unwrap().unwrap();
    assert_eq!(learned.success_count, 0);
    assert_eq!(question_loop.stats().outcomes_validated, 0);
    assert_eq!(question_loop.effectiveness_report().await.unwrap(), "# No outcomes validated yet");
}

#[tokio::test]
async fn test_reported_success_reinforces_cached_answer() {
    let question_loop = build(Arc::new(HeuristicChoiceMaker::default()), Arc::new(DeferringEscalator));
    let response = question_loop.submit_question(DB_QUESTION).await.unwrap();

    let receipt = question_loop
        .report_outcome(
            response.choice_id,
            OutcomeReport::manual(OutcomeStatus::Success)
                .with_success_signals(vec!["All tests passing".to_string()]),
        )
        .await
        .unwrap();

    assert!((receipt.original_confidence - 0.85).abs() < 1e-9);
    assert!((receipt.adjusted_confidence - 0.95).abs() < 1e-9);
    assert!((receipt.confidence_delta - 0.1).abs() < 1e-9);
    assert!(receipt.knowledge_updated);
    assert_eq!(
        receipt.learnings,
        format!("Answer 'PostgreSQL' confirmed successful for: {DB_QUESTION}")
    );

    let cached = question_loop.submit_question(DB_QUESTION).await.unwrap();
    assert!((cached.confidence - 0.95).abs() < 1e-9);

    let stats = question_loop.stats();
    assert_eq!(stats.outcomes_validated, 1);
    assert_eq!(stats.knowledge_improvements, 1);
}

#[tokio::test]
async fn test_auto_validation_confirms_stable_choices_once() {
    let question_loop = build(ScriptedChoiceMaker::new("Go ahead", 0.9), Arc::new(DeferringEscalator));
    question_loop.submit_question("Which CI provider should we keep?").await.unwrap();

    let low = build(ScriptedChoiceMaker::new("Maybe", 0.7), Arc::new(DeferringEscalator));
    low.submit_question("Which CI provider should we keep?").await.unwrap();

    let later = Utc::now() + Duration::hours(2);

    let summary = question_loop.auto_validate_at(None, later).await.unwrap();
    assert_eq!(summary.total_validated, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.knowledge_updates, 1);

    let again = question_loop.auto_validate_at(None, later).await.unwrap();
    assert_eq!(again.total_validated, 0);

    // Not confident enough to count as stable
    let skipped = low.auto_validate_at(None, later).await.unwrap();
    assert_eq!(skipped.total_validated, 0);

    let learned = question_loop
        .learned_answer("Which CI provider should we keep?")
        .await
        .unwrap()
        .unwrap();
    assert!((learned.confidence - 0.98).abs() < 1e-9);
    assert_eq!(learned.success_count, 1);
}

#[tokio::test]
async fn test_auto_validation_window_excludes_old_choices() {
    let question_loop = build(ScriptedChoiceMaker::new("Go ahead", 0.9), Arc::new(DeferringEscalator));
    question_loop.submit_question("Which CI provider should we keep?").await.unwrap();

    let much_later = Utc::now() + Duration::hours(30);
    let summary = question_loop.auto_validate_at(Some(24.0), much_later).await.unwrap();
    assert_eq!(summary.total_validated, 0);

    let summary = question_loop.auto_validate_at(Some(48.0), much_later).await.unwrap();
    assert_eq!(summary.total_validated, 1);
}

#[tokio::test]
async fn test_huge_validation_window_covers_whole_log() {
    let question_loop = build(ScriptedChoiceMaker::new("Go ahead", 0.9), Arc::new(DeferringEscalator));
    question_loop.submit_question("Which CI provider should we keep?").await.unwrap();
    question_loop.submit_question("Which CI provider should we keep?").await.unwrap();

    let summary = question_loop.auto_validate(Some(1e12)).await.unwrap();
    assert_eq!(summary.total_validated, 0);

    let later = Utc::now() + Duration::hours(2);
    let summary = question_loop.auto_validate_at(Some(f64::MAX), later).await.unwrap();
    assert_eq!(summary.total_validated, 2);
}
