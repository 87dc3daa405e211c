// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Implicit outcome signals used by auto-validation.
//!
//! A detector inspects a logged choice that has no reported outcome yet and
//! returns the success and failure indications it can infer without asking
//! anyone. The default [`StabilityDetector`] defines no failure signals.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pluggable implicit signal detection

use chrono::{DateTime, Utc};

use crate::domain::choice::ChoiceLogEntry;

pub trait ImplicitSignalDetector: Send + Sync {
    fn detect_success(&self, entry: &ChoiceLogEntry, now: DateTime<Utc>) -> Vec<String>;

    fn detect_failure(&self, entry: &ChoiceLogEntry, now: DateTime<Utc>) -> Vec<String>;
}

/// Treats confident answers that survived long enough as successful
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    pub stability_hours: f64,
    pub min_confidence: f64,
}

impl Default for StabilityDetector {
    fn default() -> Self {
        Self {
            stability_hours: 1.0,
            min_confidence: 0.8,
        }
    }
}

impl ImplicitSignalDetector for StabilityDetector {
    fn detect_success(&self, entry: &ChoiceLogEntry, now: DateTime<Utc>) -> Vec<String> {
        let choice = &entry.choice;
        let mut signals = Vec::new();

        if choice.chosen_option == "ALLOWED" && choice.question.to_lowercase().contains("delete") {
            signals.push("Operation completed without errors".to_string());
        }

        let elapsed = choice.elapsed_hours(now);
        if choice.confidence > self.min_confidence && elapsed > self.stability_hours {
            signals.push(format!(
                "High confidence choice stable after {}+ hours",
                self.stability_hours
            ));
        }

        signals
    }

    /// Never reports failures; those arrive as explicit outcome reports.
    fn detect_failure(&self, _entry: &ChoiceLogEntry, _now: DateTime<Utc>) -> Vec<String> {
        Vec::new()
    }
}
