// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Console and non-interactive escalators.
//!
//! [`ConsoleEscalator`] prints the candidate and reads a single line from
//! stdin on a detached thread. EOF, a read error or Ctrl-C defers.
//! [`DeferringEscalator`] never asks anyone.

use std::future::Future;
use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::choice::{Choice, ChoiceId};
use crate::domain::escalation::{EscalationResponse, Escalator};
use crate::domain::question::Classification;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEscalator;

impl ConsoleEscalator {
    pub fn new() -> Self {
        Self
    }
}

/// Text shown to the human before reading their answer
pub fn render_prompt(choice: &Choice, classification: &Classification) -> String {
    let mut prompt = String::new();
    prompt.push_str("\nHuman input needed\n");
    prompt.push_str(&format!("Question:   {}\n", choice.question));
    prompt.push_str(&format!(
        "Category:   {} ({:.0}%)\n",
        classification.category.as_str(),
        classification.confidence * 100.0
    ));
    prompt.push_str(&format!("Candidate:  {}\n", choice.chosen_option));
    prompt.push_str(&format!("Confidence: {:.0}%\n", choice.confidence * 100.0));
    prompt.push_str(&format!("Reasoning:  {}\n", choice.reasoning));
    if !choice.alternatives.is_empty() {
        prompt.push_str(&format!("Alternatives: {}\n", choice.alternatives.join(", ")));
    }
    prompt.push_str("Type 'yes' to approve, your own answer to override, or 'skip' to keep the candidate: ");
    prompt
}

fn read_stdin_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then_some(line))
}

/// Race one line from `read` against `interrupt`.
///
/// The reader runs on a detached thread. An interrupted read is abandoned
/// rather than joined, so it never holds up runtime shutdown.
async fn read_response<R, I>(choice_id: ChoiceId, read: R, interrupt: I) -> EscalationResponse
where
    R: FnOnce() -> io::Result<Option<String>> + Send + 'static,
    I: Future<Output = io::Result<()>>,
{
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("console-escalation".to_string())
        .spawn(move || {
            let _ = tx.send(read());
        });
    if let Err(e) = spawned {
        warn!(%choice_id, error = %e, "Could not start console reader, deferring");
        return EscalationResponse::Defer;
    }

    tokio::select! {
        result = rx => match result {
            Ok(Ok(Some(line))) => EscalationResponse::from_line(&line),
            Ok(Ok(None)) => {
                debug!(%choice_id, "No console input, deferring");
                EscalationResponse::Defer
            }
            Ok(Err(e)) => {
                warn!(%choice_id, error = %e, "Console read failed, deferring");
                EscalationResponse::Defer
            }
            Err(_) => {
                warn!(%choice_id, "Console reader exited without an answer, deferring");
                EscalationResponse::Defer
            }
        },
        _ = interrupt => {
            debug!(%choice_id, "Interrupted, deferring");
            EscalationResponse::Defer
        }
    }
}

#[async_trait]
impl Escalator for ConsoleEscalator {
    async fn escalate(&self, choice: &Choice, classification: &Classification) -> EscalationResponse {
        let mut stdout = io::stdout();
        if let Err(e) = write!(stdout, "{}", render_prompt(choice, classification))
            .and_then(|_| stdout.flush())
        {
            warn!(error = %e, "Could not write escalation prompt, deferring");
            return EscalationResponse::Defer;
        }

        read_response(choice.id, read_stdin_line, tokio::signal::ctrl_c()).await
    }
}

/// Always keeps the best guess
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferringEscalator;

#[async_trait]
impl Escalator for DeferringEscalator {
    async fn escalate(&self, choice: &Choice, _classification: &Classification) -> EscalationResponse {
        debug!(choice_id = %choice.id, "Escalation disabled, deferring");
        EscalationResponse::Defer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::QuestionClassifier;

    #[test]
    fn test_prompt_shows_candidate() {
        let choice = Choice::new("Should we rewrite the billing service?", "INSUFFICIENT_INFORMATION", "No rule matched", 0.3)
            .with_alternatives(["Rewrite", "Refactor"]);
        let classification = QuestionClassifier::new().classify(&choice.question);

        let prompt = render_prompt(&choice, &classification);
        assert!(prompt.contains("Candidate:  INSUFFICIENT_INFORMATION"));
        assert!(prompt.contains("Confidence: 30%"));
        assert!(prompt.contains("Alternatives: Rewrite, Refactor"));
        assert!(prompt.contains("human_decision"));
    }

    #[tokio::test]
    async fn test_deferring_escalator() {
        let choice = Choice::new("q", "a", "r", 0.1);
        let classification = QuestionClassifier::new().classify("q");
        assert_eq!(
            DeferringEscalator.escalate(&choice, &classification).await,
            EscalationResponse::Defer
        );
    }

    #[tokio::test]
    async fn test_console_line_is_interpreted() {
        let response = read_response(
            ChoiceId::new(),
            || Ok(Some("  Redis \n".to_string())),
            std::future::pending::<io::Result<()>>(),
        )
        .await;
        assert_eq!(response, EscalationResponse::Override("Redis".to_string()));

        let eof = read_response(ChoiceId::new(), || Ok(None), std::future::pending::<io::Result<()>>()).await;
        assert_eq!(eof, EscalationResponse::Defer);
    }

    #[test]
    fn test_interrupt_does_not_wait_for_pending_read() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let response = runtime.block_on(read_response(
            ChoiceId::new(),
            || {
                std::thread::sleep(std::time::Duration::from_secs(60));
                Ok(Some("yes".to_string()))
            },
            async { Ok(()) },
        ));
        assert_eq!(response, EscalationResponse::Defer);

        let started = std::time::Instant::now();
        drop(runtime);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
