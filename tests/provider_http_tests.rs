// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdeck::error::{ApiError, ChatError};
use chatdeck::llm::message::{Message, UsageRecord};
use chatdeck::llm::params::GenerationParameters;
use chatdeck::llm::provider::{ChatProvider, ChatRequest, RemoteFile};
use chatdeck::llm::providers::{AnthropicProvider, GoogleProvider, OpenAiProvider};

fn history() -> Vec<Message> {
    vec![Message::user("earlier question"), Message::assistant("earlier answer")]
}

fn params() -> GenerationParameters {
    GenerationParameters {
        temperature: 0.5,
        top_p: 0.9,
        top_k: 20,
        max_tokens: 256,
    }
}

async fn only_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

fn approx(value: &Value, expected: f64) -> bool {
    value
        .as_f64()
        .map(|v| (v - expected).abs() < 1e-6)
        .unwrap_or(false)
}

// ==================== Google ====================

#[tokio::test]
async fn test_google_generate_content_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "  Paris.  "}
            ]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-key", server.uri());
    let request = ChatRequest::new("gemini-2.5-flash", history(), "Capital of France?")
        .with_params(params())
        .with_attachment(RemoteFile {
            uri: "https://files.example/abc".to_string(),
            mime_type: "image/png".to_string(),
        });
    let reply = provider.send(request).await.unwrap();

    assert_eq!(reply.text, "Paris.");
    assert_eq!(reply.usage, Some(UsageRecord::new(12, 3, 15)));

    let body = only_request_body(&server).await;
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["text"], "earlier answer");
    assert_eq!(contents[2]["parts"][0]["text"], "Capital of France?");
    assert_eq!(
        contents[2]["parts"][1]["fileData"]["fileUri"],
        "https://files.example/abc"
    );
    assert_eq!(contents[2]["parts"][1]["fileData"]["mimeType"], "image/png");

    let config = &body["generationConfig"];
    assert!(approx(&config["temperature"], 0.5));
    assert!(approx(&config["topP"], 0.9));
    assert_eq!(config["topK"], 20);
    assert_eq!(config["maxOutputTokens"], 256);
}

#[tokio::test]
async fn test_google_empty_candidates_use_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("k", server.uri());
    let reply = provider
        .send(ChatRequest::new("gemini-2.5-flash", vec![], "hi"))
        .await
        .unwrap();
    assert_eq!(reply.text, "No response generated.");
    assert!(reply.usage.is_none());
}

#[tokio::test]
async fn test_google_error_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/bad-key:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/busy:generateContent"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({
                    "error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/missing:generateContent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "models/missing is not found", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("k", server.uri());
    let send = |model: &'static str| provider.send(ChatRequest::new(model, vec![], "hi"));

    assert!(matches!(
        send("bad-key").await,
        Err(ChatError::Api(ApiError::AuthenticationFailed))
    ));
    assert!(matches!(
        send("busy").await,
        Err(ChatError::Api(ApiError::RateLimited(7)))
    ));
    assert!(matches!(
        send("missing").await,
        Err(ChatError::Api(ApiError::ModelNotFound(_)))
    ));
}

#[tokio::test]
async fn test_google_upload_file_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", "g-key"))
        .and(header("x-goog-upload-protocol", "multipart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {"uri": "https://generativelanguage.googleapis.com/v1beta/files/xyz", "mimeType": "text/plain"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let file_path = dir.path().join("staged.txt");
    std::fs::write(&file_path, "file body here").unwrap();

    let provider = GoogleProvider::with_base_url("g-key", server.uri());
    let remote = provider
        .upload_file(&file_path, "text/plain", "notes.txt")
        .await
        .unwrap();

    assert_eq!(
        remote.uri,
        "https://generativelanguage.googleapis.com/v1beta/files/xyz"
    );
    assert_eq!(remote.mime_type, "text/plain");

    let requests = server.received_requests().await.unwrap();
    let raw = String::from_utf8_lossy(&requests[0].body);
    assert!(raw.contains(r#""display_name":"notes.txt""#));
    assert!(raw.contains("file body here"));
}

#[tokio::test]
async fn test_google_upload_without_uri_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file": {}})))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let file_path = dir.path().join("a.bin");
    std::fs::write(&file_path, [1u8, 2, 3]).unwrap();

    let provider = GoogleProvider::with_base_url("k", server.uri());
    let result = provider
        .upload_file(&file_path, "application/octet-stream", "a.bin")
        .await;
    assert!(matches!(
        result,
        Err(ChatError::Api(ApiError::InvalidResponse(_)))
    ));
}

// ==================== OpenAI ====================

#[tokio::test]
async fn test_openai_chat_completions_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer o-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello back"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("o-key", format!("{}/v1/", server.uri()));
    let reply = provider
        .send(ChatRequest::new("gpt-4o-mini", history(), "Hello").with_params(params()))
        .await
        .unwrap();

    assert_eq!(reply.text, "Hello back");
    assert_eq!(reply.usage, Some(UsageRecord::new(9, 2, 11)));

    let body = only_request_body(&server).await;
    assert_eq!(body["model"], "gpt-4o-mini");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"], "Hello");
    assert!(approx(&body["temperature"], 0.5));
    assert!(approx(&body["top_p"], 0.9));
    assert_eq!(body["max_tokens"], 256);
    assert!(body.get("top_k").is_none());
}

#[tokio::test]
async fn test_openai_error_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("bad", server.uri());
    let result = provider.send(ChatRequest::new("gpt-4o-mini", vec![], "hi")).await;
    assert!(matches!(
        result,
        Err(ChatError::Api(ApiError::AuthenticationFailed))
    ));
}

#[tokio::test]
async fn test_openai_plain_text_error_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("k", server.uri());
    match provider.send(ChatRequest::new("m", vec![], "hi")).await {
        Err(ChatError::Api(ApiError::ServerError { status, message })) => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream down");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

// ==================== Anthropic ====================

#[tokio::test]
async fn test_anthropic_messages_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "a-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Part one. "},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                {"type": "text", "text": "Part two."}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("a-key", server.uri());
    let reply = provider
        .send(
            ChatRequest::new("claude-3-5-sonnet-20241022", history(), "Go on")
                .with_params(params()),
        )
        .await
        .unwrap();

    assert_eq!(reply.text, "Part one. Part two.");
    assert_eq!(reply.usage, Some(UsageRecord::new(20, 6, 26)));

    let body = only_request_body(&server).await;
    assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
    assert_eq!(body["max_tokens"], 256);
    assert!(approx(&body["temperature"], 0.5));
    assert!(approx(&body["top_p"], 0.9));
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["content"], "Go on");
}

#[tokio::test]
async fn test_anthropic_rate_limit_uses_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_json(json!({
                    "type": "error",
                    "error": {"type": "rate_limit_error", "message": "slow down"}
                })),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("k", server.uri());
    let result = provider.send(ChatRequest::new("m", vec![], "hi")).await;
    assert!(matches!(
        result,
        Err(ChatError::Api(ApiError::RateLimited(30)))
    ));
}

#[tokio::test]
async fn test_anthropic_rejects_attachment_without_request() {
    let server = MockServer::start().await;
    let provider = AnthropicProvider::with_base_url("k", server.uri());
    let request = ChatRequest::new("m", vec![], "hi").with_attachment(RemoteFile {
        uri: "x".to_string(),
        mime_type: "text/plain".to_string(),
    });

    assert!(matches!(
        provider.send(request).await,
        Err(ChatError::Unsupported(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
