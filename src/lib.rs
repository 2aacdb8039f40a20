// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatdeck - multi-provider LLM chat sessions.
//!
//! This crate exposes the shared runtime used by the `chatdeck` CLI
//! (`src/main.rs`).
//!
//! Architecture highlights:
//! - `config`: settings file, legacy key migration, environment overrides
//! - `llm`: provider abstraction, Google/OpenAI/Anthropic adapters, sampling
//!   parameter sanitization and the provider factory
//! - `session`: in-memory session store, import/export and persistence
//! - `chat`: the single-turn orchestrator, upload staging, REPL commands
//! - `cli`: clap argument definitions

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod session;

pub use error::{ChatError, Result};
