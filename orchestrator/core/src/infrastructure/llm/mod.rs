// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `LLMProvider` port and one
// external API. `build_provider` turns the `decision.llm` config block into
// a ready adapter.

pub mod openai;
pub mod ollama;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::domain::llm::LLMProvider;
use crate::domain::loop_config::{LlmConfig, LlmProviderType};

pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;

/// Create a provider instance from configuration
pub fn build_provider(config: &LlmConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let api_key = resolve_api_key(config.api_key.as_deref(), |name| std::env::var(name).ok())?;

    info!(
        provider = ?config.provider_type,
        endpoint = %config.endpoint,
        model = %config.model,
        "Initializing LLM provider"
    );

    let provider: Arc<dyn LLMProvider> = match config.provider_type {
        LlmProviderType::Ollama => Arc::new(OllamaAdapter::new(
            config.endpoint.clone(),
            config.model.clone(),
        )),
        LlmProviderType::Openai => {
            let key = api_key.context("OpenAI provider requires an api_key")?;
            Arc::new(OpenAIAdapter::new(
                config.endpoint.clone(),
                key,
                config.model.clone(),
            ))
        }
        LlmProviderType::OpenaiCompatible => Arc::new(OpenAIAdapter::compatible(
            config.endpoint.clone(),
            api_key,
            config.model.clone(),
        )),
    };

    Ok(provider)
}

/// Resolve an API key (supports "env:VAR_NAME" syntax)
fn resolve_api_key<F>(key: Option<&str>, lookup: F) -> anyhow::Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match key {
        Some(k) => match k.strip_prefix("env:") {
            Some(var_name) => lookup(var_name)
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(Some(k.to_string())),
        },
        None => Ok(None),
    }
}
