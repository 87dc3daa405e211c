// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Report commands
//!
//! Commands: audit, effectiveness

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use crate::embedded::GlobalOptions;

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Audit recommendations for every reviewed choice
    Audit {
        /// Write the markdown to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// How well learned answers hold up
    Effectiveness {
        /// Write the markdown to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ReportCommand, options: &GlobalOptions) -> Result<()> {
    let runtime = options.start().await?;
    let question_loop = &runtime.question_loop;

    let (markdown, output) = match command {
        ReportCommand::Audit { output } => (
            question_loop
                .audit_report()
                .await
                .context("Failed to render audit report")?,
            output,
        ),
        ReportCommand::Effectiveness { output } => (
            question_loop
                .effectiveness_report()
                .await
                .context("Failed to render effectiveness report")?,
            output,
        ),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, markdown)
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            println!(
                "{}",
                format!("✓ Report written: {}", path.display()).green()
            );
        }
        None => print!("{markdown}"),
    }
    Ok(())
}
