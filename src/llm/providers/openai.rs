// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI Chat Completions provider
//!
//! Works against api.openai.com or any OpenAI-compatible endpoint reachable
//! through a custom base URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::common::{
    decode_error, history_text, join_url, parse_retry_after_seconds, rate_limited, server_error,
    transport_error,
};
use crate::error::{ApiError, ChatError, Result};
use crate::llm::message::{Message, UsageRecord};
use crate::llm::provider::{ChatProvider, ChatReply, ChatRequest, ProviderKind, ProviderResponse};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// OpenAI (or compatible) provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create with a custom base URL (e.g. a self-hosted compatible server)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_messages(&self, history: &[Message], user_text: &str) -> Vec<OpenAiMessage> {
        let mut messages: Vec<OpenAiMessage> = history
            .iter()
            .filter_map(|m| {
                Some(OpenAiMessage {
                    role: m.role.to_string(),
                    content: history_text(m)?,
                })
            })
            .collect();
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: user_text.to_string(),
        });
        messages
    }

    fn build_request(&self, request: &ChatRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.history, &request.user_text),
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            max_tokens: request.params.max_tokens,
        }
    }

    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> ChatError {
        let Ok(error_response) = serde_json::from_str::<OpenAiError>(body) else {
            return server_error(status, body);
        };
        let message = error_response.error.message;
        let code = error_response.error.code.as_deref().unwrap_or("");

        match (status, code) {
            (_, "invalid_api_key" | "authentication_error") | (401, _) => {
                ChatError::Api(ApiError::AuthenticationFailed)
            }
            (_, "rate_limit_exceeded") | (429, _) => rate_limited(retry_after, 60),
            (_, "model_not_found") | (404, _) => ChatError::Api(ApiError::ModelNotFound(message)),
            _ => server_error(status, message),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply> {
        if request.attachment.is_some() {
            return Err(ChatError::Unsupported(
                "File uploads are not supported for OpenAI compatible providers.".to_string(),
            ));
        }

        let body = self.build_request(&request);
        tracing::debug!(
            model = %request.model,
            base_url = %self.base_url,
            messages = body.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body, retry_after));
        }

        let api_response: OpenAiResponse = response.json().await.map_err(decode_error)?;
        Ok(ProviderResponse::OpenAi(api_response).normalize())
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

/// Chat completion response; tolerant of missing fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiChoice {
    pub message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl OpenAiResponse {
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn usage(&self) -> Option<UsageRecord> {
        self.usage.as_ref().map(|u| UsageRecord {
            prompt: u.prompt_tokens,
            output: u.completion_tokens,
            total: u.total_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    code: Option<String>,
}
