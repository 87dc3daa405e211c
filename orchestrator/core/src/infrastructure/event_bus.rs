// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels, so the CLI, the
// HTTP API and tests can observe the loop. Events are not persisted.

use crate::domain::choice::ChoiceId;
use crate::domain::events::{LearningEvent, QuestionEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Question(QuestionEvent),
    Learning(LearningEvent),
}

impl DomainEvent {
    /// Choice the event refers to, if any
    pub fn choice_id(&self) -> Option<ChoiceId> {
        match self {
            Self::Question(QuestionEvent::QuestionAnswered { choice_id, .. })
            | Self::Question(QuestionEvent::QuestionEscalated { choice_id, .. })
            | Self::Question(QuestionEvent::ChoiceAudited { choice_id, .. })
            | Self::Learning(LearningEvent::OutcomeRecorded { choice_id, .. }) => Some(*choice_id),
            Self::Learning(_) => None,
        }
    }
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is how many events are buffered before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_question_event(&self, event: QuestionEvent) {
        self.publish(DomainEvent::Question(event));
    }

    pub fn publish_learning_event(&self, event: LearningEvent) {
        self.publish(DomainEvent::Learning(event));
    }

    /// Never fails: with no subscribers the event is dropped
    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Log every event at `info` until the bus closes
    pub fn spawn_event_logger(&self) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => log_event(&event),
                    Err(EventBusError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            debug!("Event logger stopped");
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::Question(QuestionEvent::QuestionAnswered {
            choice_id,
            fingerprint,
            provenance,
            confidence,
            cache_hit,
            ..
        }) => info!(
            %choice_id,
            fingerprint = fingerprint.short(),
            %provenance,
            confidence,
            cache_hit,
            "Question answered"
        ),
        DomainEvent::Question(QuestionEvent::QuestionEscalated {
            choice_id,
            category,
            candidate_confidence,
            response,
            ..
        }) => info!(
            %choice_id,
            %category,
            candidate_confidence,
            response = ?response,
            "Question escalated"
        ),
        DomainEvent::Question(QuestionEvent::ChoiceAudited {
            choice_id,
            verdict,
            concern_count,
            ..
        }) => info!(%choice_id, %verdict, concern_count, "Choice audited"),
        DomainEvent::Learning(LearningEvent::OutcomeRecorded {
            choice_id,
            status,
            original_confidence,
            adjusted_confidence,
            ..
        }) => info!(
            %choice_id,
            %status,
            original_confidence,
            adjusted_confidence,
            "Outcome recorded"
        ),
        DomainEvent::Learning(LearningEvent::KnowledgeReinforced {
            fingerprint,
            confidence,
            success_count,
            ..
        }) => info!(
            fingerprint = fingerprint.short(),
            confidence,
            success_count,
            "Knowledge reinforced"
        ),
        DomainEvent::Learning(LearningEvent::KnowledgeRevised {
            fingerprint,
            confidence,
            failure_count,
            ..
        }) => info!(
            fingerprint = fingerprint.short(),
            confidence,
            failure_count,
            "Knowledge revised"
        ),
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::Provenance;
    use crate::domain::outcome::OutcomeStatus;
    use crate::domain::question::Fingerprint;
    use chrono::Utc;

    fn answered(choice_id: ChoiceId) -> QuestionEvent {
        QuestionEvent::QuestionAnswered {
            choice_id,
            fingerprint: Fingerprint::of("q"),
            provenance: Provenance::DecisionEngine,
            confidence: 0.85,
            cache_hit: false,
            answered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let choice_id = ChoiceId::new();

        event_bus.publish_question_event(answered(choice_id));

        match receiver.recv().await.unwrap() {
            DomainEvent::Question(QuestionEvent::QuestionAnswered { choice_id: id, .. }) => {
                assert_eq!(id, choice_id);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_logger_drains_until_bus_closes() {
        let event_bus = EventBus::new(10);
        let logger = event_bus.spawn_event_logger();
        assert_eq!(event_bus.subscriber_count(), 1);

        let choice_id = ChoiceId::new();
        event_bus.publish_question_event(answered(choice_id));
        event_bus.publish_learning_event(LearningEvent::KnowledgeReinforced {
            fingerprint: Fingerprint::of("q"),
            confidence: 0.9,
            success_count: 1,
            reinforced_at: Utc::now(),
        });
        event_bus.publish_learning_event(LearningEvent::OutcomeRecorded {
            choice_id,
            status: OutcomeStatus::Success,
            original_confidence: 0.85,
            adjusted_confidence: 0.95,
            recorded_at: Utc::now(),
        });

        drop(event_bus);
        tokio::time::timeout(std::time::Duration::from_secs(2), logger)
            .await
            .expect("logger should stop once the bus is dropped")
            .unwrap();
    }

    #[test]
    fn test_event_choice_ids() {
        let choice_id = ChoiceId::new();
        assert_eq!(
            DomainEvent::Question(answered(choice_id)).choice_id(),
            Some(choice_id)
        );
        let revised = DomainEvent::Learning(LearningEvent::KnowledgeRevised {
            fingerprint: Fingerprint::of("q"),
            confidence: 0.5,
            failure_count: 1,
            revised_at: Utc::now(),
        });
        assert_eq!(revised.choice_id(), None);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let event_bus = EventBus::default();
        event_bus.publish_question_event(answered(ChoiceId::new()));
        assert_eq!(event_bus.subscriber_count(), 0);
    }
}
