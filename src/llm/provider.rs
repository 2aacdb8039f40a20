// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! Defines the abstraction layer over the supported chat backends.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::llm::message::{Message, UsageRecord};
use crate::llm::params::GenerationParameters;
use crate::llm::providers::anthropic::AnthropicResponse;
use crate::llm::providers::google::GoogleResponse;
use crate::llm::providers::openai::OpenAiResponse;

/// Literal reply used when a provider produced no text
pub const EMPTY_REPLY_FALLBACK: &str = "No response generated.";

/// The supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// All providers, in display order
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Google,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
    ];

    /// Wire name ("google", "openai", "anthropic")
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Only Google accepts file attachments
    pub fn supports_attachments(&self) -> bool {
        matches!(self, ProviderKind::Google)
    }

    /// Upper bound for `max_tokens`
    pub fn max_tokens_ceiling(&self) -> u32 {
        match self {
            ProviderKind::Google => 8192,
            ProviderKind::OpenAi => 4096,
            ProviderKind::Anthropic => 4096,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Ok(ProviderKind::Google),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(ChatError::InvalidInput(format!(
                "Unknown provider '{}'. Expected one of: google, openai, anthropic",
                other
            ))),
        }
    }
}

/// A file already uploaded to a provider, referenced by URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub uri: String,
    pub mime_type: String,
}

/// One chat turn as handed to an adapter
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,

    /// Prior messages, already truncated to the history window
    pub history: Vec<Message>,

    /// Text of the new user turn (may be empty when a file is attached)
    pub user_text: String,

    /// Remote file reference for this turn
    pub attachment: Option<RemoteFile>,

    /// Sanitized sampling parameters
    pub params: GenerationParameters,
}

/// Normalized reply from any provider
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub usage: Option<UsageRecord>,
}

/// Main trait for chat providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Which provider family this is
    fn kind(&self) -> ProviderKind;

    /// Send one turn and return the normalized reply
    async fn send(&self, request: ChatRequest) -> Result<ChatReply>;

    /// Upload a local file so it can be referenced from a turn
    async fn upload_file(
        &self,
        _path: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<RemoteFile> {
        Err(ChatError::Unsupported(format!(
            "File uploads are not supported for {}.",
            self.kind()
        )))
    }
}

impl ChatRequest {
    /// Create a new request with default sampling parameters
    pub fn new(
        model: impl Into<String>,
        history: Vec<Message>,
        user_text: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            history,
            user_text: user_text.into(),
            attachment: None,
            params: GenerationParameters::default(),
        }
    }

    /// Set the attachment
    pub fn with_attachment(mut self, attachment: RemoteFile) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Set sampling parameters
    pub fn with_params(mut self, params: GenerationParameters) -> Self {
        self.params = params;
        self
    }
}

/// Decoded provider responses, one variant per wire format
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    Google(GoogleResponse),
    OpenAi(OpenAiResponse),
    Anthropic(AnthropicResponse),
}

impl ProviderResponse {
    /// Map any provider shape into the normalized reply
    pub fn normalize(self) -> ChatReply {
        let (text, usage) = match self {
            ProviderResponse::Google(response) => (response.text(), response.usage()),
            ProviderResponse::OpenAi(response) => (response.text(), response.usage()),
            ProviderResponse::Anthropic(response) => (response.text(), response.usage()),
        };

        let text = text.trim();
        ChatReply {
            text: if text.is_empty() {
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                text.to_string()
            },
            usage: usage.filter(|u| !u.is_empty()),
        }
    }
}
