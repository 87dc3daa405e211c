// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reports - Application Layer
//!
//! Markdown renderings of the audit ledger and the outcome store. Both are
//! recomputed from stored records on every call, so the same stored data and
//! `generated_at` always produce the same text.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Audit and effectiveness reports

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::audit::{AuditReview, AuditVerdict};
use crate::domain::choice::{ChoiceId, ChoiceLogEntry};
use crate::domain::outcome::{Outcome, OutcomeStatus};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render every review in ledger order, joined with the logged choice it judged.
///
/// Reviews whose choice is missing from the log still count toward the
/// summary but get no detail section.
pub fn render_audit_report(
    reviews: &[AuditReview],
    log: &[ChoiceLogEntry],
    generated_at: DateTime<Utc>,
) -> String {
    let choices: HashMap<ChoiceId, &ChoiceLogEntry> =
        log.iter().map(|entry| (entry.choice.id, entry)).collect();

    let count = |verdict: AuditVerdict| reviews.iter().filter(|r| r.verdict == verdict).count();

    let mut lines = vec![
        "# Audit Recommendations".to_string(),
        String::new(),
        format!("**Generated**: {}", generated_at.format(TIMESTAMP_FORMAT)),
        format!("**Total Choices Reviewed**: {}", reviews.len()),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        format!("- Approved: {}", count(AuditVerdict::Approved)),
        format!("- Questionable: {}", count(AuditVerdict::Questionable)),
        format!("- Risky: {}", count(AuditVerdict::Risky)),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Detailed Reviews".to_string(),
        String::new(),
    ];

    for (i, review) in reviews.iter().enumerate() {
        let Some(entry) = choices.get(&review.choice_id) else {
            continue;
        };
        let choice = &entry.choice;

        lines.push(format!("### {}. {}", i + 1, review.verdict.as_str().to_uppercase()));
        lines.push(String::new());
        lines.push(format!("**Choice ID**: {}", review.choice_id));
        lines.push(format!("**Question**: {}", choice.question));
        lines.push(format!("**Chosen**: {}", choice.chosen_option));
        lines.push(format!("**Confidence**: {:.0}%", choice.confidence * 100.0));
        lines.push(format!("**Source**: {}", choice.provenance.as_str()));
        lines.push(format!("**Timestamp**: {}", review.reviewed_at.to_rfc3339()));
        lines.push(String::new());

        if !review.concerns.is_empty() {
            lines.push("**Concerns**:".to_string());
            lines.extend(review.concerns.iter().map(|c| format!("- {c}")));
            lines.push(String::new());
        }

        if !review.recommendations.is_empty() {
            lines.push("**Recommendations**:".to_string());
            lines.extend(review.recommendations.iter().map(|r| format!("- {r}")));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityBand {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            Self::Excellent
        } else if rate >= 75.0 {
            Self::Good
        } else if rate >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Self::Excellent => "**EXCELLENT** - Decisions are highly reliable",
            Self::Good => "**GOOD** - Decisions are mostly reliable",
            Self::Fair => "**FAIR** - Some decisions need improvement",
            Self::Poor => "**POOR** - Decisions need significant improvement",
        }
    }
}

/// Aggregate view of the outcome store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectivenessReport {
    pub total_validated: usize,
    pub success: usize,
    pub partial: usize,
    pub failed: usize,
    pub reversed: usize,
    pub unknown: usize,
    /// Successes that reinforced a learned answer
    pub reinforcements: usize,
    /// Failures that revised a learned answer
    pub revisions: usize,
}

impl EffectivenessReport {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut report = Self {
            total_validated: outcomes.len(),
            ..Self::default()
        };

        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Success => report.success += 1,
                OutcomeStatus::Partial => report.partial += 1,
                OutcomeStatus::Failed => report.failed += 1,
                OutcomeStatus::Reversed => report.reversed += 1,
                OutcomeStatus::Unknown => report.unknown += 1,
            }
            if outcome.knowledge_updated {
                if outcome.should_revise {
                    report.revisions += 1;
                } else if outcome.status == OutcomeStatus::Success {
                    report.reinforcements += 1;
                }
            }
        }

        report
    }

    fn percent(&self, count: usize) -> f64 {
        if self.total_validated == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.total_validated as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.percent(self.success)
    }

    pub fn quality(&self) -> Option<QualityBand> {
        (self.total_validated > 0).then(|| QualityBand::from_success_rate(self.success_rate()))
    }

    pub fn render(&self, generated_at: DateTime<Utc>) -> String {
        let Some(quality) = self.quality() else {
            return "# No outcomes validated yet".to_string();
        };

        let line = |label: &str, count: usize| {
            format!("- {label}: {count} ({:.0}%)", self.percent(count))
        };

        [
            "# Decision Effectiveness Report".to_string(),
            String::new(),
            format!("**Generated**: {}", generated_at.format(TIMESTAMP_FORMAT)),
            format!("**Total Validated**: {}", self.total_validated),
            String::new(),
            "## Outcome Distribution".to_string(),
            String::new(),
            line("Success", self.success),
            line("Partial", self.partial),
            line("Failed", self.failed),
            line("Reversed", self.reversed),
            line("Unknown", self.unknown),
            String::new(),
            format!("## Success Rate: {:.0}%", self.success_rate()),
            String::new(),
            "## Learning Impact".to_string(),
            String::new(),
            format!("- Confidence reinforcements: {}", self.reinforcements),
            format!("- Knowledge revisions: {}", self.revisions),
            String::new(),
            "## Quality Assessment".to_string(),
            String::new(),
            quality.headline().to_string(),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::review_at;
    use crate::domain::choice::{Choice, Provenance};

    fn outcome(status: OutcomeStatus, knowledge_updated: bool, should_revise: bool) -> Outcome {
        Outcome {
            choice_id: ChoiceId::new(),
            question: "q".to_string(),
            answer: "a".to_string(),
            provenance: Provenance::DecisionEngine,
            original_confidence: 0.8,
            status,
            validation_method: crate::domain::outcome::ValidationMethod::Manual,
            validated_at: Utc::now(),
            elapsed_hours: 0.5,
            success_signals: vec![],
            failure_signals: vec![],
            feedback: None,
            adjusted_confidence: 0.8,
            knowledge_update: String::new(),
            should_revise,
            knowledge_updated,
        }
    }

    #[test]
    fn test_empty_store() {
        let report = EffectivenessReport::from_outcomes(&[]);
        assert_eq!(report.quality(), None);
        assert_eq!(report.render(Utc::now()), "# No outcomes validated yet");
    }

    #[test]
    fn test_effectiveness_counts_and_band() {
        let outcomes = vec![
            outcome(OutcomeStatus::Success, true, false),
            outcome(OutcomeStatus::Success, true, false),
            outcome(OutcomeStatus::Success, false, false),
            outcome(OutcomeStatus::Failed, true, true),
        ];
        let report = EffectivenessReport::from_outcomes(&outcomes);

        assert_eq!(report.total_validated, 4);
        assert_eq!(report.success, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.reinforcements, 2);
        assert_eq!(report.revisions, 1);
        assert_eq!(report.quality(), Some(QualityBand::Good));

        let text = report.render(Utc::now());
        assert!(text.contains("- Success: 3 (75%)"));
        assert!(text.contains("## Success Rate: 75%"));
        assert!(text.contains("**GOOD**"));
    }

    #[test]
    fn test_quality_bands() {
        assert_eq!(QualityBand::from_success_rate(90.0), QualityBand::Excellent);
        assert_eq!(QualityBand::from_success_rate(89.9), QualityBand::Good);
        assert_eq!(QualityBand::from_success_rate(60.0), QualityBand::Fair);
        assert_eq!(QualityBand::from_success_rate(59.0), QualityBand::Poor);
    }

    #[test]
    fn test_audit_report_layout() {
        let good = Choice::new("Should we use MongoDB or PostgreSQL?", "PostgreSQL", "r", 0.85)
            .with_sources(["a", "b", "c"])
            .with_alternatives(["MongoDB", "MySQL"]);
        let weak = Choice::new("Should we refactor?", "INSUFFICIENT_INFORMATION", "r", 0.3)
            .with_sources(["Classifier"]);
        let at = Utc::now();
        let reviews = vec![review_at(&good, at), review_at(&weak, at)];
        let log = vec![
            ChoiceLogEntry::new(good.clone(), false),
            ChoiceLogEntry::new(weak.clone(), false),
        ];

        let text = render_audit_report(&reviews, &log, at);
        assert!(text.contains("**Total Choices Reviewed**: 2"));
        assert!(text.contains("- Approved: 1"));
        assert!(text.contains("- Risky: 1"));
        assert!(text.contains("### 1. APPROVED"));
        assert!(text.contains("### 2. RISKY"));
        assert!(text.contains("**Confidence**: 85%"));
        assert!(text.contains("**Source**: decision-engine"));
        assert!(text.contains("- No alternatives considered"));

        // Re-rendering the same data is stable
        assert_eq!(text, render_audit_report(&reviews, &log, at));
    }
}
