// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Knowledge base commands
//!
//! Commands: list, show

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use answerloop_core::domain::knowledge::LearnedAnswer;

use super::percent;
use crate::embedded::GlobalOptions;

#[derive(Subcommand)]
pub enum KnowledgeCommand {
    /// List learned answers
    List {
        /// Only answers flagged for review
        #[arg(long)]
        needs_review: bool,
    },

    /// Show the learned answer for a question
    Show {
        #[arg(value_name = "QUESTION")]
        question: String,
    },
}

pub async fn handle_command(command: KnowledgeCommand, options: &GlobalOptions) -> Result<()> {
    let runtime = options.start().await?;
    let question_loop = &runtime.question_loop;

    match command {
        KnowledgeCommand::List { needs_review } => {
            let answers: Vec<LearnedAnswer> = question_loop
                .learned_answers()
                .await
                .context("Failed to read knowledge base")?
                .into_iter()
                .filter(|a| !needs_review || a.needs_review)
                .collect();

            if answers.is_empty() {
                println!("{}", "No learned answers".yellow());
                return Ok(());
            }

            println!("{}", format!("Learned answers ({}):", answers.len()).bold());
            for answer in &answers {
                println!("{}", summary_line(answer));
            }
        }
        KnowledgeCommand::Show { question } => {
            match question_loop
                .learned_answer(&question)
                .await
                .context("Failed to read knowledge base")?
            {
                Some(answer) => print!("{}", detail(&answer)),
                None => {
                    eprintln!("{}", "✗ No learned answer for this question".red());
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

fn summary_line(answer: &LearnedAnswer) -> String {
    let flag = if answer.needs_review {
        " [needs review]".yellow().to_string()
    } else {
        String::new()
    };
    format!(
        "  {} → {} ({}, used {}x){}",
        answer.question,
        answer.chosen_option.bold(),
        percent(answer.confidence),
        answer.times_used,
        flag
    )
}

fn detail(answer: &LearnedAnswer) -> String {
    let mut out = format!("{} {}\n", "Question:".bold(), answer.question);
    out.push_str(&format!("{} {}\n", "Answer:".bold(), answer.chosen_option));
    out.push_str(&format!("  Fingerprint: {}\n", answer.fingerprint.to_string().dimmed()));
    out.push_str(&format!("  Confidence: {}\n", percent(answer.confidence)));
    out.push_str(&format!("  Source: {}\n", answer.provenance));
    out.push_str(&format!("  Reasoning: {}\n", answer.reasoning));
    out.push_str(&format!("  Learned: {}\n", answer.learned_at.to_rfc3339()));
    out.push_str(&format!("  Times used: {}\n", answer.times_used));
    out.push_str(&format!("  Successes: {}\n", answer.success_count));
    if let Some(last) = answer.last_success {
        out.push_str(&format!("  Last success: {}\n", last.to_rfc3339()));
    }
    if answer.needs_review {
        out.push_str(&format!("  {}\n", "Flagged for review".yellow()));
    }
    for failure in &answer.failure_history {
        out.push_str(&format!(
            "  Failure at {}: {}\n",
            failure.recorded_at.to_rfc3339(),
            failure.failure_signals.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use answerloop_core::domain::choice::Choice;

    #[test]
    fn test_detail_includes_history() {
        colored::control::set_override(false);
        let choice = Choice::new("Mongo or Postgres?", "PostgreSQL", "Relational", 0.85);
        let mut answer = LearnedAnswer::from_choice(&choice);
        answer.needs_review = true;

        let text = detail(&answer);
        assert!(text.contains("Answer: PostgreSQL"));
        assert!(text.contains("Confidence: 85%"));
        assert!(text.contains("Flagged for review"));
        assert!(summary_line(&answer).contains("[needs review]"));
    }
}
