// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `answerloop ask`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use answerloop_core::application::SubmitResponse;
use answerloop_core::domain::audit::AuditVerdict;
use answerloop_core::domain::escalation::EscalationResponse;

use super::percent;
use crate::embedded::GlobalOptions;

#[derive(Args)]
pub struct AskArgs {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: AskArgs, options: &GlobalOptions) -> Result<()> {
    if args.question.trim().is_empty() {
        anyhow::bail!("Question must not be empty");
    }

    let runtime = options.start().await?;
    let response = runtime
        .question_loop
        .submit_question(&args.question)
        .await
        .context("Failed to answer question")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render(&args.question, &response));
    }
    Ok(())
}

fn render(question: &str, response: &SubmitResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Question:".bold(), question));
    out.push('\n');

    if response.cache_hit {
        let used = response.times_used.unwrap_or(1);
        out.push_str(&format!(
            "{}\n",
            format!("✓ Answered from knowledge base (used {used} times)").green()
        ));
    } else if let Some(classification) = &response.classification {
        out.push_str(&format!(
            "  Category: {} ({})\n",
            classification.category,
            percent(classification.confidence)
        ));
    }

    match &response.escalation {
        Some(EscalationResponse::Approve) => out.push_str(&format!("  {}\n", "Escalated: approved".cyan())),
        Some(EscalationResponse::Override(_)) => out.push_str(&format!("  {}\n", "Escalated: overridden".cyan())),
        Some(EscalationResponse::Defer) => {
            out.push_str(&format!("  {}\n", "Escalated: no response, keeping best guess".yellow()))
        }
        None => {}
    }

    out.push_str(&format!("{} {}\n", "Answer:".bold(), response.chosen_option.bold()));
    out.push_str(&format!("  Confidence: {}\n", percent(response.confidence)));
    out.push_str(&format!("  Source: {}\n", response.provenance));
    out.push_str(&format!("  Reasoning: {}\n", response.reasoning));
    if !response.consulted_sources.is_empty() {
        out.push_str(&format!("  Consulted: {}\n", response.consulted_sources.join(", ")));
    }
    if !response.alternatives.is_empty() {
        out.push_str(&format!("  Alternatives: {}\n", response.alternatives.join(", ")));
    }

    if let Some(audit) = &response.audit {
        let verdict = match audit.verdict {
            AuditVerdict::Approved => audit.verdict.to_string().green(),
            AuditVerdict::Questionable => audit.verdict.to_string().yellow(),
            AuditVerdict::Risky => audit.verdict.to_string().red(),
        };
        out.push_str(&format!("  Audit: {verdict}\n"));
        for concern in &audit.concerns {
            out.push_str(&format!("    - {concern}\n"));
        }
    }

    out.push_str(&format!("  Choice ID: {}\n", response.choice_id.to_string().dimmed()));
    out
}
