// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Loop Factory - Application Layer
//!
//! Creates concrete repositories, the decision strategy and the escalator
//! from a [`LoopConfigManifest`], keeping the domain layer free of
//! infrastructure choices.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wire a [`QuestionLoop`] from configuration

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::application::question_loop::{LoopStores, QuestionLoop};
use crate::domain::decision::{build_choice_maker, ChoiceMaker};
use crate::domain::escalation::Escalator;
use crate::domain::loop_config::{
    DecisionStrategy, EscalationMode, LoopConfigManifest, StorageBackendKind,
};
use crate::domain::signals::StabilityDetector;
use crate::infrastructure::console_escalator::{ConsoleEscalator, DeferringEscalator};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::human_input_service::{HumanInputEscalator, HumanInputService};
use crate::infrastructure::llm::build_provider;
use crate::infrastructure::repositories::{
    JsonKnowledgeRepository, JsonOutcomeRepository, JsonlAuditLedgerRepository,
    JsonlChoiceLogRepository,
};

/// A wired loop plus the handles hosts need alongside it
pub struct LoopRuntime {
    pub question_loop: Arc<QuestionLoop>,
    pub event_bus: Arc<EventBus>,
    /// Present in queue escalation mode
    pub human_input: Option<Arc<HumanInputService>>,
}

/// Creates the stores for the configured backend
pub async fn create_stores(backend: StorageBackendKind, data_dir: &Path) -> anyhow::Result<LoopStores> {
    match backend {
        StorageBackendKind::Memory => Ok(LoopStores::in_memory()),
        StorageBackendKind::File => {
            let open_err = || format!("Failed to open data directory {}", data_dir.display());
            Ok(LoopStores {
                knowledge: Arc::new(JsonKnowledgeRepository::open(data_dir).await.with_context(open_err)?),
                choice_log: Arc::new(JsonlChoiceLogRepository::open(data_dir).await.with_context(open_err)?),
                outcomes: Arc::new(JsonOutcomeRepository::open(data_dir).await.with_context(open_err)?),
                audit_ledger: Arc::new(JsonlAuditLedgerRepository::open(data_dir).await.with_context(open_err)?),
            })
        }
    }
}

/// Creates the configured decision strategy
pub fn create_choice_maker(config: &LoopConfigManifest) -> anyhow::Result<Arc<dyn ChoiceMaker>> {
    let decision = &config.spec.decision;
    let provider = match decision.strategy {
        DecisionStrategy::Heuristic => None,
        DecisionStrategy::Llm => {
            let llm = decision
                .llm
                .as_ref()
                .context("decision.strategy is 'llm' but decision.llm is not configured")?;
            Some(build_provider(llm)?)
        }
    };
    Ok(build_choice_maker(
        decision.rules.clone(),
        provider,
        decision.fallback_on_unavailable,
    ))
}

/// Creates the configured escalator, and the request queue in queue mode
pub fn create_escalator(
    config: &LoopConfigManifest,
) -> (Arc<dyn Escalator>, Option<Arc<HumanInputService>>) {
    let escalation = &config.spec.escalation;
    match escalation.mode {
        EscalationMode::Console => (Arc::new(ConsoleEscalator::new()), None),
        EscalationMode::Defer => (Arc::new(DeferringEscalator), None),
        EscalationMode::Queue => {
            let service = Arc::new(HumanInputService::new());
            let escalator = HumanInputEscalator::new(service.clone(), escalation.timeout_seconds);
            (Arc::new(escalator), Some(service))
        }
    }
}

pub async fn build_loop(config: &LoopConfigManifest) -> anyhow::Result<LoopRuntime> {
    let spec = &config.spec;
    let stores = create_stores(spec.storage.backend, &spec.storage.data_dir).await?;
    let choice_maker = create_choice_maker(config)?;
    let (escalator, human_input) = create_escalator(config);
    let event_bus = Arc::new(EventBus::with_default_capacity());

    let detector = StabilityDetector {
        stability_hours: spec.auto_validation.stability_hours,
        min_confidence: spec.auto_validation.stability_confidence,
    };

    info!(
        name = %config.metadata.name,
        storage = ?spec.storage.backend,
        data_dir = %spec.storage.data_dir.display(),
        strategy = choice_maker.name(),
        escalation = ?spec.escalation.mode,
        threshold = spec.confidence_threshold,
        "Question loop configured"
    );

    let question_loop = QuestionLoop::new(choice_maker, escalator, stores, event_bus.clone())
        .with_threshold(spec.confidence_threshold)
        .with_max_age_hours(spec.auto_validation.max_age_hours)
        .with_detector(Arc::new(detector));

    Ok(LoopRuntime {
        question_loop: Arc::new(question_loop),
        event_bus,
        human_input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_file_backed_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoopConfigManifest::default();
        config.spec.storage.data_dir = dir.path().to_path_buf();
        config.spec.escalation.mode = EscalationMode::Defer;

        let runtime = build_loop(&config).await.unwrap();
        assert!(runtime.human_input.is_none());

        let response = runtime
            .question_loop
            .submit_question("Should we use MongoDB or PostgreSQL for user management?")
            .await
            .unwrap();
        assert_eq!(response.chosen_option, "PostgreSQL");
        assert!(dir.path().join("knowledge.json").exists());
        assert!(dir.path().join("choices.jsonl").exists());
        assert!(dir.path().join("audit_ledger.jsonl").exists());
    }

    #[test]
    fn test_queue_mode_exposes_service() {
        let mut config = LoopConfigManifest::default();
        config.spec.escalation.mode = EscalationMode::Queue;
        let (_, service) = create_escalator(&config);
        assert!(service.is_some());
    }

    #[test]
    fn test_llm_strategy_requires_llm_block() {
        let mut config = LoopConfigManifest::default();
        config.spec.decision.strategy = DecisionStrategy::Llm;
        assert!(create_choice_maker(&config).is_err());
    }
}
