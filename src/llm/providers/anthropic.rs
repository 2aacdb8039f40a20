// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API provider implementation
//!
//! Implements the ChatProvider trait for the Messages API.

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

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, ANTHROPIC_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Convert internal messages to Anthropic format
    fn convert_messages(&self, history: &[Message], user_text: &str) -> Vec<AnthropicMessage> {
        history
            .iter()
            .filter_map(|m| {
                Some(AnthropicMessage {
                    role: m.role.to_string(),
                    content: history_text(m)?,
                })
            })
            .chain(std::iter::once(AnthropicMessage {
                role: "user".to_string(),
                content: user_text.to_string(),
            }))
            .collect()
    }

    /// Build the request body
    fn build_request(&self, request: &ChatRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.history, &request.user_text),
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
        }
    }

    /// Parse an error response
    ///
    /// # Arguments
    /// * `status` - HTTP status code
    /// * `body` - Response body
    /// * `retry_after` - Optional Retry-After header value in seconds
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> ChatError {
        let Ok(error_response) = serde_json::from_str::<AnthropicError>(body) else {
            return server_error(status, body);
        };

        match error_response.error.error_type.as_str() {
            "authentication_error" | "permission_error" => {
                ChatError::Api(ApiError::AuthenticationFailed)
            }
            // Use Retry-After header if available, otherwise default to 10 seconds
            "rate_limit_error" => rate_limited(retry_after, 10),
            "not_found_error" => {
                ChatError::Api(ApiError::ModelNotFound(error_response.error.message))
            }
            "invalid_request_error" => {
                ChatError::Api(ApiError::InvalidRequest(error_response.error.message))
            }
            _ => server_error(status, error_response.error.message),
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply> {
        if request.attachment.is_some() {
            return Err(ChatError::Unsupported(
                "File uploads are not supported for Anthropic.".to_string(),
            ));
        }

        let body = self.build_request(&request);
        tracing::debug!(
            model = %request.model,
            messages = body.messages.len(),
            "sending Anthropic request"
        );

        let response = self
            .client
            .post(join_url(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            // Extract Retry-After header before consuming response body
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body, retry_after));
        }

        let api_response: AnthropicResponse = response.json().await.map_err(decode_error)?;
        Ok(ProviderResponse::Anthropic(api_response).normalize())
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Messages API response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    pub usage: Option<AnthropicUsage>,
}

/// One content block; only `text` blocks contribute to the reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl AnthropicResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type.as_deref() == Some("text"))
            .filter_map(|b| b.text.as_deref())
            .collect()
    }

    /// Anthropic reports no total; it is the sum of what is known
    pub fn usage(&self) -> Option<UsageRecord> {
        let usage = self.usage.as_ref()?;
        let total = match (usage.input_tokens, usage.output_tokens) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0).saturating_add(output.unwrap_or(0))),
        };
        Some(UsageRecord {
            prompt: usage.input_tokens,
            output: usage.output_tokens,
            total,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
