// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `answerloop outcome`

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use answerloop_core::application::{LoopError, OutcomeReceipt};
use answerloop_core::domain::choice::ChoiceId;
use answerloop_core::domain::outcome::{OutcomeReport, OutcomeStatus};

use super::percent;
use crate::embedded::GlobalOptions;

#[derive(Args)]
pub struct OutcomeArgs {
    /// Choice ID printed by `answerloop ask`
    #[arg(value_name = "CHOICE_ID")]
    pub choice_id: String,

    /// success, partial, failed, reversed or unknown
    #[arg(value_name = "STATUS")]
    pub status: String,

    /// Observed success signal (repeatable)
    #[arg(long = "success", value_name = "SIGNAL")]
    pub success_signals: Vec<String>,

    /// Observed failure signal (repeatable)
    #[arg(long = "failure", value_name = "SIGNAL")]
    pub failure_signals: Vec<String>,

    /// Free-text feedback
    #[arg(long)]
    pub feedback: Option<String>,
}

impl OutcomeArgs {
    fn to_report(&self) -> Result<(ChoiceId, OutcomeReport)> {
        let choice_id: ChoiceId = self
            .choice_id
            .parse()
            .with_context(|| format!("Invalid choice ID: {}", self.choice_id))?;
        let status: OutcomeStatus = self.status.parse().map_err(|e: String| anyhow!(e))?;

        let mut report = OutcomeReport::manual(status)
            .with_success_signals(self.success_signals.clone())
            .with_failure_signals(self.failure_signals.clone());
        if let Some(feedback) = &self.feedback {
            report = report.with_feedback(feedback.clone());
        }
        Ok((choice_id, report))
    }
}

pub async fn execute(args: OutcomeArgs, options: &GlobalOptions) -> Result<()> {
    let (choice_id, report) = args.to_report()?;

    let runtime = options.start().await?;
    let receipt = match runtime.question_loop.report_outcome(choice_id, report).await {
        Ok(receipt) => receipt,
        Err(LoopError::NotFound(id)) => {
            eprintln!("{}", format!("✗ No logged choice with ID {id}").red());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to record outcome"),
    };

    print!("{}", render(&receipt));
    Ok(())
}

fn render(receipt: &OutcomeReceipt) -> String {
    let mut out = format!(
        "{}\n",
        format!("✓ Outcome recorded: {}", receipt.status).green()
    );
    out.push_str(&format!(
        "  Confidence: {} → {} ({:+.2})\n",
        percent(receipt.original_confidence),
        percent(receipt.adjusted_confidence),
        receipt.confidence_delta
    ));
    if receipt.should_revise {
        out.push_str(&format!("  {}\n", "Answer flagged for review".yellow()));
    }
    let updated = if receipt.knowledge_updated { "yes" } else { "no" };
    out.push_str(&format!("  Knowledge updated: {updated}\n"));
    out.push_str(&format!("  Learnings: {}\n", receipt.learnings));
    out
}
