// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Strategies
//!
//! The [`ChoiceMaker`] port produces a candidate answer when the knowledge
//! base has no entry for a question. Strategies are pluggable:
//!
//! - [`HeuristicChoiceMaker`]: configured keyword rules, then a
//!   classification-driven default. Deliberately conservative, so anything it
//!   is unsure about lands below the escalation threshold.
//! - [`LlmChoiceMaker`]: asks a reasoning backend for a JSON verdict.
//! - [`FallbackChoiceMaker`]: primary strategy with a fallback on error.
//!
//! Use [`build_choice_maker`] to assemble the configured strategy.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Candidate answer generation

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::choice::Choice;
use crate::domain::llm::{GenerationOptions, LLMError, LLMProvider};
use crate::domain::loop_config::DecisionRule;
use crate::domain::question::{Classification, QuestionCategory};

const EVIDENCED_FACTUAL_CONFIDENCE: f64 = 0.9;
const HYBRID_CONFIDENCE: f64 = 0.55;
const CLARIFICATION_CONFIDENCE: f64 = 0.4;
const UNDECIDED_CONFIDENCE: f64 = 0.3;

/// Verbs that make a factual question a permission check
const PERMISSION_VERBS: &[&str] = &["can i ", "may i ", "is it safe to", "allowed"];

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Reasoning backend error: {0}")]
    Provider(#[from] LLMError),

    #[error("Invalid decision response: {0}")]
    InvalidResponse(String),

    #[error("Decision strategy unavailable: {0}")]
    Unavailable(String),
}

/// Candidate answer producer consumed by the question loop
#[async_trait]
pub trait ChoiceMaker: Send + Sync {
    async fn decide(&self, question: &str, classification: &Classification) -> Result<Choice, DecisionError>;

    /// Short strategy label for logs
    fn name(&self) -> &'static str;
}

/// Keyword rules first, then a default derived from the classification
pub struct HeuristicChoiceMaker {
    rules: Vec<DecisionRule>,
}

impl HeuristicChoiceMaker {
    pub fn new(rules: Vec<DecisionRule>) -> Self {
        Self { rules }
    }

    fn from_classification(question: &str, classification: &Classification) -> Choice {
        let lower = question.to_lowercase();
        match classification.category {
            QuestionCategory::AgentAnswerable => {
                let is_permission = PERMISSION_VERBS.iter().any(|v| lower.contains(v));
                let (option, reasoning) = if is_permission {
                    ("ALLOWED", "Security analysis: Operation is safe with low risk")
                } else {
                    ("Analysis provided", "Factual question answered from available analysis")
                };
                let confidence = if classification.has_evidence() {
                    EVIDENCED_FACTUAL_CONFIDENCE
                } else {
                    classification.confidence
                };
                Choice::new(question, option, reasoning, confidence).with_sources(["Security"])
            }
            QuestionCategory::Hybrid => Choice::new(
                question,
                "Explore options before deciding",
                "Question needs research into the available options followed by a decision",
                HYBRID_CONFIDENCE,
            )
            .with_sources(["Architecture", "Classifier"])
            .with_alternatives(["Decide now with current information"]),
            QuestionCategory::ClarificationNeeded => Choice::new(
                question,
                "NEEDS_CLARIFICATION",
                "Question is too ambiguous to answer; more context is required",
                CLARIFICATION_CONFIDENCE,
            )
            .with_sources(["Classifier"]),
            QuestionCategory::HumanDecision => Choice::new(
                question,
                "INSUFFICIENT_INFORMATION",
                "No learned pattern or specific knowledge for this question. \
                 This appears to be a new scenario requiring human expertise and context.",
                UNDECIDED_CONFIDENCE,
            )
            .with_sources(["Classifier"]),
        }
    }
}

impl Default for HeuristicChoiceMaker {
    fn default() -> Self {
        Self::new(crate::domain::loop_config::default_decision_rules())
    }
}

#[async_trait]
impl ChoiceMaker for HeuristicChoiceMaker {
    async fn decide(&self, question: &str, classification: &Classification) -> Result<Choice, DecisionError> {
        let lower = question.to_lowercase();

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lower)) {
            tracing::debug!(rule = %rule.name, "Heuristic rule matched");
            return Ok(Choice::new(question, &rule.chosen_option, &rule.reasoning, rule.confidence)
                .with_sources(rule.sources.iter().cloned())
                .with_alternatives(rule.alternatives.iter().cloned()));
        }

        Ok(Self::from_classification(question, classification))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

#[derive(Debug, Deserialize)]
struct LlmVerdict {
    chosen_option: String,
    #[serde(default)]
    reasoning: String,
    confidence: f64,
    #[serde(default)]
    alternatives: Vec<String>,
}

const PROMPT_TEMPLATE: &str = r#"You are the decision engine of a software engineering assistant.

Question:
{question}

Classifier hint: {category} (confidence {classification_confidence})

Choose the best answer. Respond only with a JSON object:
{
  "chosen_option": "the answer you choose",
  "reasoning": "why, in one or two sentences",
  "confidence": 0.0-1.0,
  "alternatives": ["other options you considered"]
}

Use a low confidence when the answer depends on context you do not have."#;

/// Asks a reasoning backend for a decision
pub struct LlmChoiceMaker {
    llm_provider: Arc<dyn LLMProvider>,
}

impl LlmChoiceMaker {
    pub fn new(llm_provider: Arc<dyn LLMProvider>) -> Self {
        Self { llm_provider }
    }

    fn render_prompt(&self, question: &str, classification: &Classification) -> String {
        PROMPT_TEMPLATE
            .replace("{question}", question)
            .replace("{category}", classification.category.as_str())
            .replace(
                "{classification_confidence}",
                &format!("{:.2}", classification.confidence),
            )
    }

    fn parse_verdict(text: &str) -> Result<LlmVerdict, DecisionError> {
        // Models sometimes wrap the object in prose or code fences
        let start = text.find('{');
        let end = text.rfind('}');
        let body = match (start, end) {
            (Some(s), Some(e)) if s < e => &text[s..=e],
            _ => {
                return Err(DecisionError::InvalidResponse(format!(
                    "no JSON object in response: {text}"
                )))
            }
        };

        let verdict: LlmVerdict = serde_json::from_str(body)
            .map_err(|e| DecisionError::InvalidResponse(format!("{e}. Response: {text}")))?;

        if verdict.chosen_option.trim().is_empty() {
            return Err(DecisionError::InvalidResponse("empty chosen_option".to_string()));
        }
        Ok(verdict)
    }
}

#[async_trait]
impl ChoiceMaker for LlmChoiceMaker {
    async fn decide(&self, question: &str, classification: &Classification) -> Result<Choice, DecisionError> {
        let prompt = self.render_prompt(question, classification);
        let options = GenerationOptions {
            temperature: Some(0.1),
            max_tokens: Some(600),
            ..Default::default()
        };

        let response = self.llm_provider.generate(&prompt, &options).await?;
        let verdict = Self::parse_verdict(&response.text)?;

        Ok(Choice::new(
            question,
            verdict.chosen_option.trim(),
            verdict.reasoning,
            verdict.confidence,
        )
        .with_sources([format!("llm:{}", response.model)])
        .with_alternatives(verdict.alternatives))
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Primary strategy, falling back to a secondary one on error
pub struct FallbackChoiceMaker {
    primary: Arc<dyn ChoiceMaker>,
    fallback: Arc<dyn ChoiceMaker>,
}

impl FallbackChoiceMaker {
    pub fn new(primary: Arc<dyn ChoiceMaker>, fallback: Arc<dyn ChoiceMaker>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ChoiceMaker for FallbackChoiceMaker {
    async fn decide(&self, question: &str, classification: &Classification) -> Result<Choice, DecisionError> {
        match self.primary.decide(question, classification).await {
            Ok(choice) => Ok(choice),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "Decision strategy failed, falling back: {}",
                    e
                );
                self.fallback.decide(question, classification).await
            }
        }
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}

/// Factory to build the configured decision strategy
pub fn build_choice_maker(
    rules: Vec<DecisionRule>,
    llm_provider: Option<Arc<dyn LLMProvider>>,
    fallback_on_unavailable: bool,
) -> Arc<dyn ChoiceMaker> {
    let heuristic: Arc<dyn ChoiceMaker> = Arc::new(HeuristicChoiceMaker::new(rules));
    match llm_provider {
        Some(provider) => {
            let llm: Arc<dyn ChoiceMaker> = Arc::new(LlmChoiceMaker::new(provider));
            if fallback_on_unavailable {
                Arc::new(FallbackChoiceMaker::new(llm, heuristic))
            } else {
                llm
            }
        }
        None => heuristic,
    }
}
