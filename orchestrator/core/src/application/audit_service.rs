// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Audit Service - Application Layer
//!
//! Reviews each finalized choice and appends the review to the ledger.
//! Ledger writes and event publication fail open: the review is returned
//! even when it could not be stored.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::audit::{review_at, AuditReview};
use crate::domain::choice::Choice;
use crate::domain::events::QuestionEvent;
use crate::domain::repository::{AuditLedgerRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

pub struct AuditService {
    ledger: Arc<dyn AuditLedgerRepository>,
    event_bus: Arc<EventBus>,
}

impl AuditService {
    pub fn new(ledger: Arc<dyn AuditLedgerRepository>, event_bus: Arc<EventBus>) -> Self {
        Self { ledger, event_bus }
    }

    pub async fn audit(&self, choice: &Choice) -> AuditReview {
        let review = review_at(choice, Utc::now());

        debug!(
            choice_id = %choice.id,
            verdict = %review.verdict,
            concerns = review.concerns.len(),
            "Choice audited"
        );
        metrics::counter!("answerloop_audit_verdicts_total", "verdict" => review.verdict.as_str())
            .increment(1);

        if let Err(e) = self.ledger.append(&review).await {
            warn!(choice_id = %choice.id, error = %e, "Failed to append audit review");
        }

        self.event_bus.publish_question_event(QuestionEvent::ChoiceAudited {
            choice_id: review.choice_id,
            verdict: review.verdict,
            concern_count: review.concerns.len(),
            audited_at: review.reviewed_at,
        });

        review
    }

    /// Full ledger in append order
    pub async fn reviews(&self) -> Result<Vec<AuditReview>, RepositoryError> {
        self.ledger.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditVerdict;
    use crate::infrastructure::repositories::InMemoryAuditLedgerRepository;

    #[tokio::test]
    async fn test_reviews_are_appended_in_order() {
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut rx = bus.subscribe();
        let service = AuditService::new(Arc::new(InMemoryAuditLedgerRepository::new()), bus);

        let first = Choice::new("q1", "a", "r", 0.3);
        let second = Choice::new("q2", "b", "r", 0.9)
            .with_sources(["x", "y"])
            .with_alternatives(["c"]);

        assert_eq!(service.audit(&first).await.verdict, AuditVerdict::Risky);
        assert_eq!(service.audit(&second).await.verdict, AuditVerdict::Approved);

        let ledger = service.reviews().await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].choice_id, first.id);
        assert_eq!(ledger[1].choice_id, second.id);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.choice_id(), Some(first.id));
    }
}
