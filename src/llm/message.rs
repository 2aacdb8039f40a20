// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! Defines the provider-agnostic message and usage structures stored in
//! sessions and handed to provider adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text content of the message
    pub content: String,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// Name of the file attached to this turn, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Token usage reported for this reply
    #[serde(default, alias = "tokens", skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageRecord>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// Token usage statistics
///
/// Every field is optional because providers differ in what they report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Prompt (input) tokens
    pub prompt: Option<u32>,
    /// Output (completion) tokens
    pub output: Option<u32>,
    /// Total tokens
    pub total: Option<u32>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            file: None,
            usage: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            file: None,
            usage: None,
        }
    }

    /// Attach a file name
    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    /// Attach a usage record
    pub fn with_usage(mut self, usage: UsageRecord) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl Role {
    /// Parse a role string; only the two conversational roles are accepted
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl UsageRecord {
    /// Usage with all three counts known
    pub fn new(prompt: u32, output: u32, total: u32) -> Self {
        Self {
            prompt: Some(prompt),
            output: Some(output),
            total: Some(total),
        }
    }

    /// Word-count estimate used when a provider reports nothing
    pub fn estimated(prompt_text: &str, reply_text: &str) -> Self {
        Self {
            prompt: Some(estimate_tokens(prompt_text)),
            output: Some(estimate_tokens(reply_text)),
            total: None,
        }
    }

    /// True when no count is known
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.output.is_none() && self.total.is_none()
    }
}

/// Rough token estimate: whitespace-separated words, at least 1 for
/// non-empty text. Diagnostic only, not billing-accurate.
pub fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    if words == 0 {
        0
    } else {
        u32::try_from(words).unwrap_or(u32::MAX)
    }
}

/// The most recent `limit` messages, in conversation order
pub fn history_window(messages: &[Message], limit: usize) -> &[Message] {
    let start = messages.len().saturating_sub(limit);
    &messages[start..]
}
