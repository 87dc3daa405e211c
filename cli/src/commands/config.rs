// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use answerloop_core::domain::loop_config::{DecisionStrategy, LoopConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./answerloop-config.yaml)
        #[arg(short, long, default_value = "./answerloop-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = LoopConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. ANSWERLOOP_CONFIG_PATH: {}",
            std::env::var("ANSWERLOOP_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./answerloop-config.yaml");
        println!("  4. ~/.answerloop/config.yaml");
        println!("  5. /etc/answerloop/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Loop:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Confidence threshold: {}", spec.confidence_threshold);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    println!("  Data directory: {}", spec.storage.data_dir.display());
    println!();

    println!("{}", "Escalation:".bold());
    println!("  Mode: {:?}", spec.escalation.mode);
    println!("  Timeout: {}s", spec.escalation.timeout_seconds);
    println!();

    println!("{}", "Decision:".bold());
    println!("  Strategy: {:?}", spec.decision.strategy);
    println!("  Rules: {}", spec.decision.rules.len());
    for rule in &spec.decision.rules {
        println!(
            "    - {} [{}] → {}",
            rule.name,
            rule.keywords.join(", "),
            rule.chosen_option
        );
    }
    if spec.decision.strategy == DecisionStrategy::Llm {
        match &spec.decision.llm {
            Some(llm) => {
                println!("  LLM: {:?} {} ({})", llm.provider_type, llm.model, llm.endpoint);
                println!("  Fallback on unavailable: {}", spec.decision.fallback_on_unavailable);
            }
            None => println!("  LLM: {}", "(not configured)".red()),
        }
    }
    println!();

    println!("{}", "Auto-validation:".bold());
    println!("  Window: {}h", spec.auto_validation.max_age_hours);
    println!(
        "  Stability: >{}h at >{}",
        spec.auto_validation.stability_hours, spec.auto_validation.stability_confidence
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = LoopConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    std::fs::write(&output, template(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn template(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid() {
        for with_examples in [false, true] {
            let config = LoopConfigManifest::from_yaml_str(template(with_examples)).unwrap();
            config.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("answerloop-config.yaml");
        generate(output.clone(), false).await.unwrap();
        let written = LoopConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(written.kind, "LoopConfig");
    }
}
