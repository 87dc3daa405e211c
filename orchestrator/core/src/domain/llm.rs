// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reasoning Backend Port
//!
//! Vendor-neutral interface to a language model used by the LLM choice
//! strategy. Adapters live in `infrastructure::llm`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary for LLM providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<(), LLMError>;

    /// Model identifier, used as the consulted source of a choice
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    /// Low by default: answers should be repeatable
    pub temperature: Option<f32>,
    /// Ask the backend for a JSON object when it supports it
    #[serde(default)]
    pub json_response: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(1024),
            temperature: Some(0.2),
            json_response: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// e.g. "openai", "ollama"
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LLMError {
    /// Whether the backend could not be reached at all, as opposed to answering badly
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit)
    }
}
