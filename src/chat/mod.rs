// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat turn handling
//!
//! The orchestrator runs a single turn end to end; `commands` parses REPL
//! input and `upload` stages attachments.

pub mod commands;
pub mod orchestrator;
pub mod upload;

pub use orchestrator::{
    failure_message, ChatOrchestrator, ChatTurnRequest, TurnEnvelope, TurnFailure, TurnOutcome,
    TurnReply,
};
pub use upload::{FileUpload, StagedUpload};
