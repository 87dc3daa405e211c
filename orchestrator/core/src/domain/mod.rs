// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, aggregates, pure policies and ports of the question loop.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Business rules with no I/O

pub mod question;
pub mod classifier;
pub mod choice;
pub mod knowledge;
pub mod audit;
pub mod outcome;
pub mod escalation;
pub mod decision;
pub mod signals;
pub mod events;
pub mod stats;
pub mod llm;
pub mod repository;
pub mod loop_config;
