// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! answerloop core
//!
//! Learning and decision engine of the answerloop question feedback loop:
//! classify a question, answer it from the knowledge base or a decision
//! strategy, escalate low-confidence answers to a human, audit every
//! finalized choice, and adjust learned confidence from reported outcomes.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, adapters and HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
