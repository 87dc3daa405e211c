// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON File Repositories
//!
//! Durable repositories rooted at a data directory:
//!
//! | File | Layout | Write path |
//! |------|--------|------------|
//! | `knowledge.json` | map keyed by fingerprint | temp file + rename |
//! | `outcomes.json` | map keyed by choice id | temp file + rename |
//! | `choices.jsonl` | one entry per line | append + flush |
//! | `audit_ledger.jsonl` | one review per line | append + flush |
//!
//! Each store loads its file once on open and keeps the records behind a
//! `tokio::sync::Mutex`; the lock is held across the file write, so every
//! read-modify-write is serialized and written through before the call
//! returns. An unreadable or corrupt map file opens as empty with a warning.
//! Corrupt JSONL lines are skipped.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** File-backed persistence for single-process deployments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::audit::AuditReview;
use crate::domain::choice::{Choice, ChoiceId, ChoiceLogEntry};
use crate::domain::knowledge::{FailureRecord, LearnedAnswer};
use crate::domain::outcome::Outcome;
use crate::domain::question::Fingerprint;
use crate::domain::repository::{
    AuditLedgerRepository, ChoiceLogRepository, KnowledgeRepository, OutcomeRepository,
    RepositoryError,
};

pub const KNOWLEDGE_FILE: &str = "knowledge.json";
pub const OUTCOMES_FILE: &str = "outcomes.json";
pub const CHOICE_LOG_FILE: &str = "choices.jsonl";
pub const AUDIT_LEDGER_FILE: &str = "audit_ledger.jsonl";

async fn ensure_dir(dir: &Path) -> Result<(), RepositoryError> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

async fn load_map<V: DeserializeOwned>(path: &Path) -> BTreeMap<String, V> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    if content.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str(&content) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

async fn write_map<V: Serialize>(path: &Path, map: &BTreeMap<String, V>) -> Result<(), RepositoryError> {
    let json = serde_json::to_vec_pretty(map)?;
    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

async fn load_lines<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Log unreadable, starting empty");
            return Vec::new();
        }
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(number, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), line = number + 1, error = %e, "Skipping corrupt log line");
                None
            }
        })
        .collect()
}

async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), RepositoryError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// `knowledge.json`
pub struct JsonKnowledgeRepository {
    path: PathBuf,
    answers: Mutex<BTreeMap<String, LearnedAnswer>>,
}

impl JsonKnowledgeRepository {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = data_dir.as_ref();
        ensure_dir(dir).await?;
        let path = dir.join(KNOWLEDGE_FILE);
        let answers = load_map(&path).await;
        debug!(path = %path.display(), count = answers.len(), "Knowledge base loaded");
        Ok(Self {
            path,
            answers: Mutex::new(answers),
        })
    }

    /// Apply `mutate` to an existing record and write the map through.
    ///
    /// The in-memory record only changes once the write succeeded.
    async fn update<F>(&self, fingerprint: &Fingerprint, mutate: F) -> Result<Option<LearnedAnswer>, RepositoryError>
    where
        F: FnOnce(&mut LearnedAnswer) + Send,
    {
        let mut answers = self.answers.lock().await;
        let Some(current) = answers.get(fingerprint.as_str()) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        mutate(&mut updated);

        let previous = answers.insert(fingerprint.as_str().to_string(), updated.clone());
        if let Err(e) = write_map(&self.path, &answers).await {
            if let Some(previous) = previous {
                answers.insert(fingerprint.as_str().to_string(), previous);
            }
            return Err(e);
        }
        Ok(Some(updated))
    }
}

#[async_trait]
impl KnowledgeRepository for JsonKnowledgeRepository {
    async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError> {
        self.update(fingerprint, LearnedAnswer::record_use).await
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<LearnedAnswer>, RepositoryError> {
        Ok(self.answers.lock().await.get(fingerprint.as_str()).cloned())
    }

    async fn upsert(&self, choice: &Choice) -> Result<LearnedAnswer, RepositoryError> {
        let answer = LearnedAnswer::from_choice(choice);
        let mut answers = self.answers.lock().await;
        let previous = answers.insert(answer.fingerprint.as_str().to_string(), answer.clone());
        if let Err(e) = write_map(&self.path, &answers).await {
            // Keep memory consistent with disk
            match previous {
                Some(previous) => answers.insert(answer.fingerprint.as_str().to_string(), previous),
                None => answers.remove(answer.fingerprint.as_str()),
            };
            return Err(e);
        }
        Ok(answer)
    }

    async fn reinforce(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<LearnedAnswer>, RepositoryError> {
        self.update(fingerprint, |answer| answer.reinforce(adjusted_confidence, at))
            .await
    }

    async fn mark_failure(
        &self,
        fingerprint: &Fingerprint,
        adjusted_confidence: f64,
        failure: FailureRecord,
    ) -> Result<Option<LearnedAnswer>, RepositoryError> {
        self.update(fingerprint, |answer| answer.revise(adjusted_confidence, failure))
            .await
    }

    async fn list_all(&self) -> Result<Vec<LearnedAnswer>, RepositoryError> {
        let mut answers: Vec<LearnedAnswer> = self.answers.lock().await.values().cloned().collect();
        answers.sort_by(|a, b| a.learned_at.cmp(&b.learned_at));
        Ok(answers)
    }
}

/// `outcomes.json`
pub struct JsonOutcomeRepository {
    path: PathBuf,
    outcomes: Mutex<BTreeMap<String, Outcome>>,
}

impl JsonOutcomeRepository {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = data_dir.as_ref();
        ensure_dir(dir).await?;
        let path = dir.join(OUTCOMES_FILE);
        let outcomes = load_map(&path).await;
        Ok(Self {
            path,
            outcomes: Mutex::new(outcomes),
        })
    }
}

#[async_trait]
impl OutcomeRepository for JsonOutcomeRepository {
    async fn save(&self, outcome: &Outcome) -> Result<(), RepositoryError> {
        let mut outcomes = self.outcomes.lock().await;
        let key = outcome.choice_id.to_string();
        let previous = outcomes.insert(key.clone(), outcome.clone());
        if let Err(e) = write_map(&self.path, &outcomes).await {
            match previous {
                Some(previous) => outcomes.insert(key, previous),
                None => outcomes.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<Outcome>, RepositoryError> {
        Ok(self.outcomes.lock().await.get(&id.to_string()).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Outcome>, RepositoryError> {
        let mut outcomes: Vec<Outcome> = self.outcomes.lock().await.values().cloned().collect();
        outcomes.sort_by(|a, b| a.validated_at.cmp(&b.validated_at));
        Ok(outcomes)
    }
}

/// `choices.jsonl`
pub struct JsonlChoiceLogRepository {
    path: PathBuf,
    entries: Mutex<Vec<ChoiceLogEntry>>,
}

impl JsonlChoiceLogRepository {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = data_dir.as_ref();
        ensure_dir(dir).await?;
        let path = dir.join(CHOICE_LOG_FILE);
        let entries = load_lines(&path).await;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

#[async_trait]
impl ChoiceLogRepository for JsonlChoiceLogRepository {
    async fn append(&self, entry: &ChoiceLogEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.lock().await;
        append_line(&self.path, entry).await?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ChoiceId) -> Result<Option<ChoiceLogEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .find(|e| e.choice.id == id)
            .cloned())
    }

    async fn find_since(&self, since: DateTime<Utc>) -> Result<Vec<ChoiceLogEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|e| e.logged_at >= since)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ChoiceLogEntry>, RepositoryError> {
        Ok(self.entries.lock().await.clone())
    }
}

/// `audit_ledger.jsonl`
pub struct JsonlAuditLedgerRepository {
    path: PathBuf,
    reviews: Mutex<Vec<AuditReview>>,
}

impl JsonlAuditLedgerRepository {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = data_dir.as_ref();
        ensure_dir(dir).await?;
        let path = dir.join(AUDIT_LEDGER_FILE);
        let reviews = load_lines(&path).await;
        Ok(Self {
            path,
            reviews: Mutex::new(reviews),
        })
    }
}

#[async_trait]
impl AuditLedgerRepository for JsonlAuditLedgerRepository {
    async fn append(&self, review: &AuditReview) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.lock().await;
        append_line(&self.path, review).await?;
        reviews.push(review.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<AuditReview>, RepositoryError> {
        Ok(self.reviews.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_corrupt_knowledge_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(KNOWLEDGE_FILE), "{ not json").unwrap();

        let repo = JsonKnowledgeRepository::open(dir.path()).await.unwrap();
        assert!(repo.list_all().await.unwrap().is_empty());

        // The next write replaces the corrupt file
        repo.upsert(&Choice::new("q", "A", "r", 0.7)).await.unwrap();
        let reopened = JsonKnowledgeRepository::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_log_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let first = ChoiceLogEntry::new(Choice::new("first", "a", "r", 0.5), false);
        let second = ChoiceLogEntry::new(Choice::new("second", "b", "r", 0.5), false);
        let content = format!(
            "{}\n{{truncated\n\n{}\n",
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        std::fs::write(dir.path().join(CHOICE_LOG_FILE), content).unwrap();

        let repo = JsonlChoiceLogRepository::open(dir.path()).await.unwrap();
        let entries = repo.list_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].choice.question, "second");
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        JsonlAuditLedgerRepository::open(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonKnowledgeRepository::open(dir.path()).await.unwrap();
        repo.upsert(&Choice::new("q", "A", "r", 0.7)).await.unwrap();

        assert!(dir.path().join(KNOWLEDGE_FILE).exists());
        assert!(!dir.path().join("knowledge.json.tmp").exists());
    }
}
