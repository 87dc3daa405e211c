// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the answerloop CLI

pub mod ask;
pub mod config;
pub mod knowledge;
pub mod outcome;
pub mod report;
pub mod serve;
pub mod validate;

pub use self::ask::AskArgs;
pub use self::config::ConfigCommand;
pub use self::knowledge::KnowledgeCommand;
pub use self::outcome::OutcomeArgs;
pub use self::report::ReportCommand;
pub use self::serve::ServeArgs;
pub use self::validate::ValidateArgs;

/// Format a 0..=1 confidence as a whole percentage
pub(crate) fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}
