// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Human Input Service - queue-mode escalation
//!
//! Holds low-confidence candidates until an external authority answers them
//! (usually through the HTTP API). Each request waits on a oneshot channel;
//! a timeout, cancellation or dropped channel resolves to `Defer`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::choice::{Choice, ChoiceId};
use crate::domain::escalation::{EscalationResponse, Escalator};
use crate::domain::question::{Classification, QuestionCategory};

/// A pending escalation request
#[derive(Debug)]
struct EscalationRequest {
    id: Uuid,
    choice_id: ChoiceId,
    question: String,
    candidate: String,
    confidence: f64,
    category: QuestionCategory,
    created_at: DateTime<Utc>,
    timeout_seconds: u64,
    response_tx: oneshot::Sender<EscalationResponse>,
}

impl EscalationRequest {
    fn info(&self) -> PendingEscalation {
        PendingEscalation {
            id: self.id,
            choice_id: self.choice_id,
            question: self.question.clone(),
            candidate: self.candidate.clone(),
            confidence: self.confidence,
            category: self.category,
            created_at: self.created_at,
            timeout_seconds: self.timeout_seconds,
        }
    }
}

/// Registry of escalations awaiting a human answer
pub struct HumanInputService {
    pending_requests: Arc<RwLock<HashMap<Uuid, EscalationRequest>>>,
}

impl HumanInputService {
    pub fn new() -> Self {
        Self {
            pending_requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Queue a candidate and wait for a response (with timeout)
    pub async fn request_escalation(
        &self,
        choice: &Choice,
        category: QuestionCategory,
        timeout_seconds: u64,
    ) -> EscalationResponse {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        let request = EscalationRequest {
            id: request_id,
            choice_id: choice.id,
            question: choice.question.clone(),
            candidate: choice.chosen_option.clone(),
            confidence: choice.confidence,
            category,
            created_at: Utc::now(),
            timeout_seconds,
            response_tx: tx,
        };

        {
            let mut requests = self.pending_requests.write().await;
            requests.insert(request_id, request);
        }

        info!(
            request_id = %request_id,
            choice_id = %choice.id,
            confidence = choice.confidence,
            timeout_seconds = timeout_seconds,
            "Escalation queued"
        );

        // Spawn timeout task
        let pending_requests = self.pending_requests.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_seconds)).await;

            let mut requests = pending_requests.write().await;
            if let Some(request) = requests.remove(&request_id) {
                warn!(request_id = %request_id, "Escalation timed out, deferring");
                let _ = request.response_tx.send(EscalationResponse::Defer);
            }
        });

        // A dropped sender means the request was discarded without an answer
        rx.await.unwrap_or(EscalationResponse::Defer)
    }

    async fn resolve(&self, request_id: Uuid, response: EscalationResponse) -> Result<()> {
        let mut requests = self.pending_requests.write().await;

        if let Some(request) = requests.remove(&request_id) {
            info!(
                request_id = %request_id,
                choice_id = %request.choice_id,
                response = ?response,
                "Escalation answered"
            );
            // Receiver may be gone if the asker disconnected
            let _ = request.response_tx.send(response);
            Ok(())
        } else {
            anyhow::bail!("Request {} not found or already completed", request_id)
        }
    }

    /// Accept the candidate as-is
    pub async fn submit_approval(&self, request_id: Uuid) -> Result<()> {
        self.resolve(request_id, EscalationResponse::Approve).await
    }

    /// Replace the candidate with the authority's answer
    pub async fn submit_override(&self, request_id: Uuid, answer: String) -> Result<()> {
        if answer.trim().is_empty() {
            anyhow::bail!("Override answer must not be empty");
        }
        self.resolve(request_id, EscalationResponse::Override(answer))
            .await
    }

    /// Keep the best guess
    pub async fn submit_deferral(&self, request_id: Uuid) -> Result<()> {
        self.resolve(request_id, EscalationResponse::Defer).await
    }

    /// Get list of pending requests, oldest first
    pub async fn list_pending_requests(&self) -> Vec<PendingEscalation> {
        let requests = self.pending_requests.read().await;
        let mut pending: Vec<PendingEscalation> =
            requests.values().map(EscalationRequest::info).collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    pub async fn get_pending_request(&self, request_id: Uuid) -> Option<PendingEscalation> {
        let requests = self.pending_requests.read().await;
        requests.get(&request_id).map(EscalationRequest::info)
    }

    /// Cancel a pending request; the waiting pipeline defers
    pub async fn cancel_request(&self, request_id: Uuid) -> Result<()> {
        let mut requests = self.pending_requests.write().await;

        if let Some(request) = requests.remove(&request_id) {
            debug!(request_id = %request_id, "Escalation cancelled");
            let _ = request.response_tx.send(EscalationResponse::Defer);
            Ok(())
        } else {
            anyhow::bail!("Request {} not found", request_id)
        }
    }
}

impl Default for HumanInputService {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a pending escalation (for serialization/API)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PendingEscalation {
    pub id: Uuid,
    pub choice_id: ChoiceId,
    pub question: String,
    pub candidate: String,
    pub confidence: f64,
    pub category: QuestionCategory,
    pub created_at: DateTime<Utc>,
    pub timeout_seconds: u64,
}

/// [`Escalator`] backed by the shared request queue
pub struct HumanInputEscalator {
    service: Arc<HumanInputService>,
    timeout_seconds: u64,
}

impl HumanInputEscalator {
    pub fn new(service: Arc<HumanInputService>, timeout_seconds: u64) -> Self {
        Self {
            service,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl Escalator for HumanInputEscalator {
    async fn escalate(&self, choice: &Choice, classification: &Classification) -> EscalationResponse {
        self.service
            .request_escalation(choice, classification.category, self.timeout_seconds)
            .await
    }
}
