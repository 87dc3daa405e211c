// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod llm;
pub mod human_input_service;
pub mod console_escalator;

pub use console_escalator::{ConsoleEscalator, DeferringEscalator};
pub use human_input_service::{HumanInputEscalator, HumanInputService, PendingEscalation};
