// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `answerloop validate`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use answerloop_core::application::AutoValidationSummary;

use crate::embedded::GlobalOptions;

#[derive(Args)]
pub struct ValidateArgs {
    /// Only consider choices logged within this many hours (default: config)
    #[arg(long, value_name = "N")]
    pub hours: Option<f64>,
}

pub async fn execute(args: ValidateArgs, options: &GlobalOptions) -> Result<()> {
    if let Some(hours) = args.hours {
        if !hours.is_finite() || hours <= 0.0 {
            anyhow::bail!("--hours must be positive");
        }
    }

    let runtime = options.start().await?;
    let summary = runtime
        .question_loop
        .auto_validate(args.hours)
        .await
        .context("Auto-validation failed")?;

    print!("{}", render(&summary));
    Ok(())
}

fn render(summary: &AutoValidationSummary) -> String {
    if summary.total_validated == 0 {
        return format!("{}\n", "No choices ready for auto-validation".yellow());
    }

    let mut out = format!(
        "{}\n",
        format!("✓ Auto-validated {} choices", summary.total_validated).green()
    );
    out.push_str(&format!("  Success: {}\n", summary.success));
    out.push_str(&format!("  Failed: {}\n", summary.failed));
    if summary.partial + summary.unknown + summary.reversed > 0 {
        out.push_str(&format!("  Partial: {}\n", summary.partial));
        out.push_str(&format!("  Unknown: {}\n", summary.unknown));
        out.push_str(&format!("  Reversed: {}\n", summary.reversed));
    }
    out.push_str(&format!("  Knowledge updates: {}\n", summary.knowledge_updates));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_summary() {
        colored::control::set_override(false);
        assert_eq!(
            render(&AutoValidationSummary::default()),
            "No choices ready for auto-validation\n"
        );

        let summary = AutoValidationSummary {
            total_validated: 2,
            success: 2,
            knowledge_updates: 2,
            ..Default::default()
        };
        let text = render(&summary);
        assert!(text.contains("Auto-validated 2 choices"));
        assert!(!text.contains("Partial"));
    }
}
