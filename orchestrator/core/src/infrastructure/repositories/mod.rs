// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository ports defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve loop records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## JSON File Repositories
//!
//! Durable implementations rooted at the configured data directory (see
//! [`json_file`]):
//! - **JsonKnowledgeRepository** - `knowledge.json`, fingerprint-keyed map
//! - **JsonlChoiceLogRepository** - `choices.jsonl`, append-only
//! - **JsonOutcomeRepository** - `outcomes.json`, choice-id-keyed map
//! - **JsonlAuditLedgerRepository** - `audit_ledger.jsonl`, append-only
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests and `storage.backend: memory`.

pub mod json_file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::audit::AuditReview;
use crate::domain::choice::{Choice, ChoiceId, ChoiceLogEntry};
use crate::domain::knowledge::{FailureRecord, LearnedAnswer};
use crate::domain::outcome::Outcome;
use crate::domain::question::Fingerprint;
use crate::domain::repository::{
    AuditLedgerRepository, ChoiceLogRepository, KnowledgeRepository, OutcomeRepository,
    RepositoryError,
};

pub use json_file::{
    JsonKnowledgeRepository, JsonOutcomeRepository, JsonlAuditLedgerRepository,
    JsonlChoiceLogRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryKnowledgeRepository {
    answers: Arc<RwLock<HashMap<Fingerprint, LearnedAnswer>>>,
}

impl InMemoryKnowledgeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError> {
        let mut answers = self.answers.write();
        Ok(answers.get_mut(fingerprint).map(|answer| {
            answer.record_use();
            answer.clone()
        }))
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError> {
        Ok(self.answers.read().get(fingerprint).cloned())
    }

    async fn upsert(&self, choice: &Choice) -> Result<LearnedAnswer, RepositoryError> {
        let answer = LearnedAnswer::from_choice(choice);
        self.answers
            .write()
            .insert(answer.fingerprint.clone(), answer.clone());
        Ok(answer)
    }

    async fn reinforce(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<LearnedAnswer>, RepositoryError> {
        let mut answers = self.answers.write();
        Ok(answers.get_mut(fingerprint).map(|answer| {
            answer.reinforce(adjusted_confidence, at);
            answer.clone()
        }))
    }

    async fn mark_failure(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        failure: FailureRecord,
    ) -> Result<Option<LearnedAnswer>, RepositoryError> {
        let mut answers = self.answers.write();
        Ok(answers.get_mut(fingerprint).map(|answer| {
            answer.revise(adjusted_confidence, failure);
            answer.clone()
        }))
    }

    async fn list_all(&self) -> Result<Vec<LearnedAnswer>, RepositoryError> {
        let mut answers: Vec<LearnedAnswer> = self.answers.read().values().cloned().collect();
        answers.sort_by(|a, b| a.learned_at.cmp(&b.learned_at));
        Ok(answers)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChoiceLogRepository {
    entries: Arc<RwLock<Vec<ChoiceLogEntry>>>,
}

impl InMemoryChoiceLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChoiceLogRepository for InMemoryChoiceLogRepository {
    async fn append(&self, entry: &ChoiceLogEntry) -> Result<(), RepositoryError> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<ChoiceLogEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .iter()
            .rev()
            .find(|e| e.choice.id == id)
            .cloned())
    }

    async fn find_since(&self, since: DateTime<Utc>) -> Result<Vec<ChoiceLogEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.logged_at >= since)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ChoiceLogEntry>, RepositoryError> {
        Ok(self.entries.read().clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOutcomeRepository {
    outcomes: Arc<RwLock<HashMap<ChoiceId, Outcome>>>,
}

impl InMemoryOutcomeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeRepository for InMemoryOutcomeRepository {
    async fn save(&self, outcome: &Outcome) -> Result<(), RepositoryError> {
        self.outcomes.write().insert(outcome.choice_id, outcome.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<Outcome>, RepositoryError> {
        Ok(self.outcomes.read().get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Outcome>, RepositoryError> {
        let mut outcomes: Vec<Outcome> = self.outcomes.read().values().cloned().collect();
        outcomes.sort_by(|a, b| a.validated_at.cmp(&b.validated_at));
        Ok(outcomes)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditLedgerRepository {
    reviews: Arc<RwLock<Vec<AuditReview>>>,
}

impl InMemoryAuditLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLedgerRepository for InMemoryAuditLedgerRepository {
    async fn append(&self, review: &AuditReview) -> Result<(), RepositoryError> {
        self.reviews.write().push(review.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AuditReview>, RepositoryError> {
        Ok(self.reviews.read().clone())
    }
}
