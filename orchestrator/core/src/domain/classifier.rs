// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Question Classifier
//!
//! Pure pattern-based classification of incoming questions into handling
//! categories. Pattern groups are evaluated hybrid first (most specific), then
//! decision, then factual. Within a category every matching pattern counts as
//! one corroborating signal:
//!
//! ```text
//! confidence = min(cap, base + matches * 0.1)
//! ```
//!
//! | Category | base | cap |
//! |----------|------|-----|
//! | hybrid | 0.70 | 0.90 |
//! | human decision | 0.75 | 0.95 |
//! | agent answerable | 0.80 | 0.95 |
//!
//! When nothing matches, structural heuristics apply, and ambiguity defaults
//! to requiring a human.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Stateless question classification

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::domain::question::{normalize, Classification, QuestionCategory};

const SIGNAL_WEIGHT: f64 = 0.1;

/// Auxiliaries that mark a factual question when they appear in the leading words.
const FACTUAL_AUXILIARIES: &[&str] = &["is", "are", "does", "do", "can", "will", "has", "have"];
const LEADING_WORDS: usize = 3;
const MIN_CLASSIFIABLE_WORDS: usize = 4;
const HEURISTIC_CONFIDENCE: f64 = 0.6;
const DEFAULT_CONFIDENCE: f64 = 0.5;

struct PatternGroup {
    name: &'static str,
    patterns: &'static [&'static str],
}

struct CategoryRules {
    category: QuestionCategory,
    prefix: &'static str,
    base: f64,
    cap: f64,
    description: &'static str,
    groups: &'static [PatternGroup],
}

const HYBRID_RULES: CategoryRules = CategoryRules {
    category: QuestionCategory::Hybrid,
    prefix: "hybrid",
    base: 0.7,
    cap: 0.9,
    description: "needs research + human decision",
    groups: &[
        PatternGroup {
            name: "options_exploration",
            patterns: &[
                r"\bwhat\s+are\s+(my|the|our)\s+options\b",
                r"\bwhat\s+(could|can|should)\s+i\s+(consider|explore|look\s+at)\b",
                r"\bwhat\s+are\s+the\s+(alternatives|possibilities|choices)\b",
            ],
        },
        PatternGroup {
            name: "decision_help",
            patterns: &[
                r"\bhelp\s+me\s+(decide|choose|pick|select)\b",
                r"\bi\s+need\s+help\s+(deciding|choosing)\b",
                r"\bnot\s+sure\s+(which|what)\s+to\s+(choose|use|pick)\b",
            ],
        },
        PatternGroup {
            name: "pros_cons",
            patterns: &[
                r"\bpros\s+and\s+cons\s+of\b",
                r"\badvantages\s+and\s+disadvantages\b",
                r"\btradeoffs?\s+(of|between)\b",
            ],
        },
    ],
};

const DECISION_RULES: CategoryRules = CategoryRules {
    category: QuestionCategory::HumanDecision,
    prefix: "decision",
    base: 0.75,
    cap: 0.95,
    description: "requires human choice",
    groups: &[
        PatternGroup {
            name: "explicit_choice",
            patterns: &[
                r"\bshould\s+(we|i)\s+(use|choose|pick|go\s+with|adopt|select)\b",
                r"\bwhich\s+(is|should|would|do\s+you)\s+(better|best|recommend|prefer)\b",
                r"\bwhat('s| is)\s+(best|recommended|preferred|better)\b",
                r"\b(better|worse)\s+to\s+(use|choose|go\s+with)\b",
            ],
        },
        PatternGroup {
            name: "comparison",
            patterns: &[
                r"\b(mongodb|postgres|postgresql|mysql|react|vue|angular|django|flask)\s+(or|vs|versus)\s+(mongodb|postgres|postgresql|mysql|react|vue|angular|django|flask)\b",
                r"\bcompare\s+.*\s+(and|vs|versus|or|with)\b",
                r"\b(pros\s+and\s+cons|advantages\s+and\s+disadvantages)\s+of\b",
            ],
        },
        PatternGroup {
            name: "strategy_policy",
            patterns: &[
                r"\bwhat\s+(should|will|would)\s+(our|my|the)\s+(strategy|approach|policy|plan)\b",
                r"\bhow\s+(should|do|shall)\s+(we|i)\s+(handle|manage|organize|structure|implement)\b",
                r"\bwhat('s| is)\s+(our|my|the)\s+(strategy|approach|policy)\b",
            ],
        },
        PatternGroup {
            name: "preference",
            patterns: &[
                r"\bhow\s+(should|do)\s+(we|i)\s+(name|format|organize|structure)\b",
                r"\bwhat\s+(naming|coding|formatting)\s+(convention|standard|style)\b",
            ],
        },
    ],
};

const FACTUAL_RULES: CategoryRules = CategoryRules {
    category: QuestionCategory::AgentAnswerable,
    prefix: "factual",
    base: 0.8,
    cap: 0.95,
    description: "has objective answer",
    groups: &[
        PatternGroup {
            name: "permission_safety",
            patterns: &[
                r"\bcan\s+i\s+(delete|modify|remove|access|edit|change|update)\b",
                r"\bis\s+it\s+safe\s+to\b",
                r"\bis\s+(this|that)\s+allowed\b",
                r"\bmay\s+i\s+(delete|modify|remove|access)\b",
            ],
        },
        PatternGroup {
            name: "technical_fact",
            patterns: &[
                r"\bwhat\s+(is|does|are)\s+the\s+(complexity|performance|time|speed|cost|impact)\b",
                r"\bwhat('s| is)\s+the\s+(performance|memory|cpu|time)\s+(impact|cost|overhead)\b",
                r"\bhow\s+(fast|slow|efficient|expensive)\s+is\b",
                r"\bwhat\s+(does|is)\s+this\s+(do|mean|return)\b",
            ],
        },
        PatternGroup {
            name: "code_quality",
            patterns: &[
                r"\bdoes\s+this\s+(follow|violate|meet|satisfy)\b",
                r"\bis\s+this\s+(code|function|method)\s+(correct|valid|safe|good)\b",
                r"\b(are|is)\s+there\s+(any\s+)?(issues|problems|bugs|errors)\b",
            ],
        },
        PatternGroup {
            name: "test_coverage",
            patterns: &[
                r"\b(are|is)\s+there\s+(any\s+)?(tests|coverage)\b",
                r"\b(what|which)\s+tests\s+(exist|are\s+missing|should\s+i\s+write)\b",
                r"\bhow\s+(much|good)\s+is\s+the\s+test\s+coverage\b",
            ],
        },
    ],
};

/// Evaluation order matters: the first category with any match wins.
const RULE_ORDER: [&CategoryRules; 3] = [&HYBRID_RULES, &DECISION_RULES, &FACTUAL_RULES];

struct CompiledCategory {
    rules: &'static CategoryRules,
    patterns: Vec<(String, Regex)>,
}

static COMPILED: LazyLock<Vec<CompiledCategory>> = LazyLock::new(|| {
    RULE_ORDER
        .iter()
        .map(|&rules| {
            let patterns = rules
                .groups
                .iter()
                .flat_map(|group| {
                    group.patterns.iter().filter_map(move |pattern| match Regex::new(pattern) {
                        Ok(re) => Some((format!("{}.{}", rules.prefix, group.name), re)),
                        Err(e) => {
                            tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid classifier pattern");
                            None
                        }
                    })
                })
                .collect();
            CompiledCategory { rules, patterns }
        })
        .collect()
});

/// Counts of patterns available per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternStats {
    pub hybrid_patterns: usize,
    pub decision_patterns: usize,
    pub factual_patterns: usize,
    pub total_patterns: usize,
}

/// Stateless, deterministic question classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionClassifier;

impl QuestionClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a question into a handling category.
    pub fn classify(&self, question: &str) -> Classification {
        let text = normalize(question);

        for compiled in COMPILED.iter() {
            if let Some(classification) = Self::match_category(compiled, &text) {
                return classification;
            }
        }

        Self::fallback(&text)
    }

    fn match_category(compiled: &CompiledCategory, text: &str) -> Option<Classification> {
        let matched: Vec<String> = compiled
            .patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(label, _)| label.clone())
            .collect();

        if matched.is_empty() {
            return None;
        }

        let rules = compiled.rules;
        let confidence = (rules.base + matched.len() as f64 * SIGNAL_WEIGHT).min(rules.cap);
        Some(Classification {
            category: rules.category,
            confidence,
            reasoning: format!(
                "Matched {} {} pattern(s): {}",
                matched.len(),
                rules.prefix,
                rules.description
            ),
            matched_evidence: matched,
        })
    }

    fn fallback(text: &str) -> Classification {
        let words: Vec<&str> = text.split_whitespace().collect();
        let leading = &words[..LEADING_WORDS.min(words.len())];

        if leading.iter().any(|w| FACTUAL_AUXILIARIES.contains(w)) {
            return Classification {
                category: QuestionCategory::AgentAnswerable,
                confidence: HEURISTIC_CONFIDENCE,
                matched_evidence: vec![],
                reasoning: "Question appears factual based on structure (starts with is/are/can/does)"
                    .to_string(),
            };
        }

        if words.len() < MIN_CLASSIFIABLE_WORDS {
            return Classification {
                category: QuestionCategory::ClarificationNeeded,
                confidence: HEURISTIC_CONFIDENCE,
                matched_evidence: vec![],
                reasoning: "Question is too short to classify confidently".to_string(),
            };
        }

        Classification {
            category: QuestionCategory::HumanDecision,
            confidence: DEFAULT_CONFIDENCE,
            matched_evidence: vec![],
            reasoning: "No clear pattern match; defaulting to human decision".to_string(),
        }
    }

    pub fn pattern_stats(&self) -> PatternStats {
        let count = |rules: &CategoryRules| rules.groups.iter().map(|g| g.patterns.len()).sum::<usize>();
        let hybrid_patterns = count(&HYBRID_RULES);
        let decision_patterns = count(&DECISION_RULES);
        let factual_patterns = count(&FACTUAL_RULES);
        PatternStats {
            hybrid_patterns,
            decision_patterns,
            factual_patterns,
            total_patterns: hybrid_patterns + decision_patterns + factual_patterns,
        }
    }
}
