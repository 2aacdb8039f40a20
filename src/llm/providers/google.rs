// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini API provider implementation
//!
//! Implements the ChatProvider trait for the Gemini `generateContent` API,
//! including the two-step Files API upload used for attachments.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::common::{
    decode_error, history_text, join_url, parse_retry_after_seconds, rate_limited, server_error,
    transport_error,
};
use crate::error::{ApiError, ChatError, Result};
use crate::llm::message::{Message, Role, UsageRecord};
use crate::llm::provider::{
    ChatProvider, ChatReply, ChatRequest, ProviderKind, ProviderResponse, RemoteFile,
};

const GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Google Gemini provider
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    /// Create a new Google provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GOOGLE_API_URL)
    }

    /// Create with a custom API root
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn generate_url(&self, model: &str) -> String {
        join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", model),
        )
    }

    fn upload_url(&self) -> String {
        join_url(&self.base_url, "upload/v1beta/files")
    }

    /// Convert history to Gemini contents (assistant turns use role "model")
    fn convert_history(&self, history: &[Message]) -> Vec<GoogleContent> {
        history
            .iter()
            .filter_map(|m| {
                Some(GoogleContent {
                    role: google_role(m.role).to_string(),
                    parts: vec![GooglePart::Text {
                        text: history_text(m)?,
                    }],
                })
            })
            .collect()
    }

    /// Build the request body
    fn build_request(&self, request: &ChatRequest) -> GoogleRequest {
        let mut contents = self.convert_history(&request.history);

        let mut parts = Vec::new();
        if !request.user_text.is_empty() {
            parts.push(GooglePart::Text {
                text: request.user_text.clone(),
            });
        }
        if let Some(ref file) = request.attachment {
            parts.push(GooglePart::File {
                file_data: GoogleFileData {
                    mime_type: file.mime_type.clone(),
                    file_uri: file.uri.clone(),
                },
            });
        }
        if !parts.is_empty() {
            contents.push(GoogleContent {
                role: "user".to_string(),
                parts,
            });
        }

        GoogleRequest {
            contents,
            generation_config: GoogleGenerationConfig {
                temperature: request.params.temperature,
                top_p: request.params.top_p,
                top_k: request.params.top_k,
                max_output_tokens: request.params.max_tokens,
            },
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str, retry_after: Option<u64>) -> ChatError {
        let Ok(error_response) = serde_json::from_str::<GoogleError>(body) else {
            return server_error(status, body);
        };
        let detail = error_response.error;
        let message = detail.message.unwrap_or_default();

        match (status, detail.status.as_deref()) {
            (401 | 403, _) | (_, Some("UNAUTHENTICATED" | "PERMISSION_DENIED")) => {
                ChatError::Api(ApiError::AuthenticationFailed)
            }
            (_, _) if message.contains("API key not valid") => {
                ChatError::Api(ApiError::AuthenticationFailed)
            }
            (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => rate_limited(retry_after, 60),
            (404, _) | (_, Some("NOT_FOUND")) => ChatError::Api(ApiError::ModelNotFound(message)),
            _ => server_error(status, message),
        }
    }
}

fn google_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[async_trait]
impl ChatProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply> {
        let body = self.build_request(&request);
        tracing::debug!(
            model = %request.model,
            contents = body.contents.len(),
            "sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
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

        let api_response: GoogleResponse = response.json().await.map_err(decode_error)?;
        Ok(ProviderResponse::Google(api_response).normalize())
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        let content = tokio::fs::read(path).await?;
        tracing::debug!(
            bytes = content.len(),
            mime_type,
            "uploading file to Gemini Files API"
        );

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                Part::bytes(content)
                    .file_name(display_name.to_string())
                    .mime_str(mime_type)?,
            );

        let response = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body, retry_after));
        }

        let uploaded: GoogleUploadResponse = response.json().await.map_err(decode_error)?;
        let file = uploaded.file.unwrap_or_default();
        let uri = file.uri.ok_or_else(|| {
            ChatError::Api(ApiError::InvalidResponse(
                "Upload response did not include a file URI".to_string(),
            ))
        })?;

        tracing::info!(uri = %uri, "file uploaded to Gemini");
        Ok(RemoteFile {
            uri,
            mime_type: file
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        })
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    contents: Vec<GoogleContent>,
    generation_config: GoogleGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GoogleContent {
    role: String,
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GooglePart {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: GoogleFileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

/// `generateContent` response; every field may be absent
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    pub usage_metadata: Option<GoogleUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleCandidate {
    pub content: Option<GoogleCandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleCandidateContent {
    #[serde(default)]
    pub parts: Vec<GoogleResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleResponsePart {
    pub text: Option<String>,
    /// Set on reasoning parts, which are not part of the answer
    #[serde(default)]
    pub thought: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsage {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

impl GoogleResponse {
    /// Text of the first candidate, reasoning parts excluded
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn usage(&self) -> Option<UsageRecord> {
        self.usage_metadata.as_ref().map(|u| UsageRecord {
            prompt: u.prompt_token_count,
            output: u.candidates_token_count,
            total: u.total_token_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUploadResponse {
    file: Option<GoogleFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFile {
    uri: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::params::GenerationParameters;

    #[test]
    fn test_provider_new() {
        let provider = GoogleProvider::new("test-key");
        assert_eq!(provider.api_key, "test-key");
        assert_eq!(provider.base_url, GOOGLE_API_URL);
        assert_eq!(provider.kind(), ProviderKind::Google);
    }

    #[test]
    fn test_urls() {
        let provider = GoogleProvider::with_base_url("k", "http://localhost:9000/");
        assert_eq!(
            provider.generate_url("gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            provider.upload_url(),
            "http://localhost:9000/upload/v1beta/files"
        );
    }

    #[test]
    fn test_convert_history_maps_assistant_to_model() {
        let provider = GoogleProvider::new("k");
        let converted =
            provider.convert_history(&[Message::user("Hello"), Message::assistant("Hi there!")]);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "model");
    }

    #[test]
    fn test_convert_history_never_sends_empty_text() {
        let provider = GoogleProvider::new("k");
        let converted = provider.convert_history(&[
            Message::user("").with_file(Some("scan.png".to_string())),
            Message::assistant("A scanned invoice."),
            Message::assistant(""),
        ]);
        let json = serde_json::to_value(&converted).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["parts"][0]["text"], "[attached file: scan.png]");
        assert_eq!(json[1]["parts"][0]["text"], "A scanned invoice.");
    }

    #[test]
    fn test_build_request_wire_shape() {
        let provider = GoogleProvider::new("k");
        let history = vec![Message::assistant("Earlier")];
        let request = ChatRequest::new("gemini-2.5-flash", history, "Describe this")
            .with_attachment(RemoteFile {
                uri: "https://files/abc".to_string(),
                mime_type: "image/png".to_string(),
            })
            .with_params(GenerationParameters {
                temperature: 0.5,
                top_p: 0.9,
                top_k: 20,
                max_tokens: 256,
            });

        let json = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(json["contents"][0]["role"], "model");
        assert_eq!(json["contents"][1]["role"], "user");
        assert_eq!(json["contents"][1]["parts"][0]["text"], "Describe this");
        assert_eq!(
            json["contents"][1]["parts"][1]["fileData"]["fileUri"],
            "https://files/abc"
        );
        assert_eq!(
            json["contents"][1]["parts"][1]["fileData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["generationConfig"]["topK"], 20);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_build_request_file_only_turn() {
        let provider = GoogleProvider::new("k");
        let request = ChatRequest::new("m", vec![], "").with_attachment(RemoteFile {
            uri: "u".to_string(),
            mime_type: "application/pdf".to_string(),
        });
        let json = serde_json::to_value(provider.build_request(&request)).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].get("fileData").is_some());
    }

    #[test]
    fn test_response_text_skips_thoughts_and_tolerates_gaps() {
        let response: GoogleResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "Hello"},
                {"inlineData": {}},
                {"text": " world"}
            ]}}]
        }))
        .unwrap();
        assert_eq!(response.text(), "Hello world");
        assert!(response.usage().is_none());

        let empty: GoogleResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_response_usage() {
        let response: GoogleResponse = serde_json::from_value(serde_json::json!({
            "candidates": [],
            "usageMetadata": {"promptTokenCount": 7, "totalTokenCount": 9}
        }))
        .unwrap();
        assert_eq!(
            response.usage(),
            Some(UsageRecord {
                prompt: Some(7),
                output: None,
                total: Some(9)
            })
        );
    }

    #[test]
    fn test_parse_error_variants() {
        let provider = GoogleProvider::new("k");
        let auth = provider.parse_error(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
            None,
        );
        assert!(matches!(auth, ChatError::Api(ApiError::AuthenticationFailed)));

        let limited = provider.parse_error(
            429,
            r#"{"error":{"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#,
            Some(7),
        );
        assert!(matches!(limited, ChatError::Api(ApiError::RateLimited(7))));

        let missing = provider.parse_error(
            404,
            r#"{"error":{"message":"models/nope is not found","status":"NOT_FOUND"}}"#,
            None,
        );
        assert!(matches!(missing, ChatError::Api(ApiError::ModelNotFound(_))));

        let raw = provider.parse_error(503, "upstream unavailable", None);
        match raw {
            ChatError::Api(ApiError::ServerError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
