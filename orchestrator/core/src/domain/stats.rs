// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pipeline statistics.
//!
//! Counters live in the [`PipelineStats`] value owned by one question loop
//! instance; they reset only when that instance is dropped. Every increment is
//! mirrored to a `metrics` counter so a host-installed recorder can export
//! process totals.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Per-instance pipeline counters

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_questions: u64,
    pub cache_hits: u64,
    pub decisions_made: u64,
    pub escalations: u64,
    pub outcomes_validated: u64,
    pub knowledge_improvements: u64,
}

impl PipelineStats {
    pub fn record_question(&mut self) {
        self.total_questions += 1;
        metrics::counter!("answerloop_questions_total").increment(1);
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
        metrics::counter!("answerloop_cache_hits_total").increment(1);
    }

    pub fn record_decision(&mut self) {
        self.decisions_made += 1;
        metrics::counter!("answerloop_decisions_total").increment(1);
    }

    pub fn record_escalation(&mut self) {
        self.escalations += 1;
        metrics::counter!("answerloop_escalations_total").increment(1);
    }

    pub fn record_outcome(&mut self, knowledge_updated: bool) {
        self.outcomes_validated += 1;
        if knowledge_updated {
            self.knowledge_improvements += 1;
            metrics::counter!("answerloop_knowledge_updates_total").increment(1);
        }
    }

    /// Share of questions answered from the knowledge base, in percent
    pub fn cache_hit_rate(&self) -> f64 {
        percent(self.cache_hits, self.total_questions)
    }

    /// Share of questions that needed a human, in percent
    pub fn escalation_rate(&self) -> f64 {
        percent(self.escalations, self.total_questions)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
