// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the loop's four stores. Interfaces are defined in
//! the domain layer and implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|----------------|
//! | `KnowledgeRepository` | `LearnedAnswer` | `InMemoryKnowledgeRepository`, `JsonKnowledgeRepository` |
//! | `ChoiceLogRepository` | `ChoiceLogEntry` | `InMemoryChoiceLogRepository`, `JsonlChoiceLogRepository` |
//! | `OutcomeRepository` | `Outcome` | `InMemoryOutcomeRepository`, `JsonOutcomeRepository` |
//! | `AuditLedgerRepository` | `AuditReview` | `InMemoryAuditLedgerRepository`, `JsonlAuditLedgerRepository` |
//!
//! ## Durability
//!
//! Every mutating call is written through before it returns. The knowledge
//! repository is the only component allowed to change a learned answer's
//! confidence or outcome history after creation, and implementations must
//! serialize read-modify-write on a fingerprint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::audit::AuditReview;
use crate::domain::choice::{Choice, ChoiceId, ChoiceLogEntry};
use crate::domain::knowledge::{FailureRecord, LearnedAnswer};
use crate::domain::outcome::Outcome;
use crate::domain::question::Fingerprint;

/// Knowledge base keyed by question fingerprint
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Cache lookup. A hit increments and persists the usage counter before returning.
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError>;

    /// Read without touching the usage counter
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError>;

    /// Learn a finalized choice, replacing any previous record for its fingerprint
    async fn upsert(&self, choice: &Choice) -> Result<LearnedAnswer, RepositoryError>;

    /// Apply a confirmed success. Returns `None` if nothing is learned for the fingerprint.
    async fn reinforce(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<LearnedAnswer>, RepositoryError>;

    /// Apply a confirmed failure. Returns `None` if nothing is learned for the fingerprint.
    async fn mark_failure(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        failure: FailureRecord,
    ) -> Result<Option<LearnedAnswer>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<LearnedAnswer>, RepositoryError>;
}

/// Append-only log of every processed question
#[async_trait]
pub trait ChoiceLogRepository: Send + Sync {
    async fn append(&self, entry: &ChoiceLogEntry) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<ChoiceLogEntry>, RepositoryError>;

    /// Entries logged at or after `since`, in log order
    async fn find_since(&self, since: DateTime<Utc>) -> Result<Vec<ChoiceLogEntry>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<ChoiceLogEntry>, RepositoryError>;
}

/// One outcome per choice identifier; saving again overwrites
#[async_trait]
pub trait OutcomeRepository: Send + Sync {
    async fn save(&self, outcome: &Outcome) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<Outcome>, RepositoryError>;

    async fn contains(&self, id: ChoiceId) -> Result<bool, RepositoryError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn list_all(&self) -> Result<Vec<Outcome>, RepositoryError>;
}

/// Append-only audit review ledger
#[async_trait]
pub trait AuditLedgerRepository: Send + Sync {
    async fn append(&self, review: &AuditReview) -> Result<(), RepositoryError>;

    /// Reviews in ledger order
    async fn list_all(&self) -> Result<Vec<AuditReview>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
