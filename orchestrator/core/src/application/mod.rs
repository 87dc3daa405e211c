// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit_service;
pub mod outcome_processor;
pub mod question_loop;
pub mod reports;
pub mod loop_factory;

// Re-export use cases for convenience
pub use loop_factory::{build_loop, LoopRuntime};
pub use question_loop::{
    AutoValidationSummary, LoopError, LoopStores, OutcomeReceipt, QuestionLoop, SubmitResponse,
};
pub use reports::{EffectivenessReport, QualityBand};
