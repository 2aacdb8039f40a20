// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chat provider for testing
//!
//! Provides a configurable mock implementation of the ChatProvider trait
//! (and a matching ProviderSource) that can be used in tests without
//! making real API calls.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{ApiError, ChatError, Result};
use crate::llm::factory::ProviderSource;
use crate::llm::message::UsageRecord;
use crate::llm::provider::{ChatProvider, ChatReply, ChatRequest, ProviderKind, RemoteFile};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// A pre-configured reply for the mock provider
#[derive(Clone, Debug)]
pub struct MockReply {
    /// Text content to return
    pub text: String,
    /// Usage to report (None simulates a provider that reports nothing)
    pub usage: Option<UsageRecord>,
}

impl Default for MockReply {
    fn default() -> Self {
        Self {
            text: "This is a mock response.".to_string(),
            usage: Some(UsageRecord::new(10, 5, 15)),
        }
    }
}

/// One recorded call to `upload_file`
#[derive(Clone, Debug)]
pub struct RecordedUpload {
    pub path: PathBuf,
    pub mime_type: String,
    pub display_name: String,
    /// Whether the staged file existed when the upload was attempted
    pub existed: bool,
    /// Contents read from the staged file
    pub bytes: Vec<u8>,
}

/// A mock chat provider for testing
#[derive(Clone)]
pub struct MockProvider {
    kind: ProviderKind,
    /// Configured replies, returned in order; the last one repeats
    replies: Arc<Mutex<Vec<MockReply>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<ChatRequest>>>,
    recorded_uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    send_error: Arc<Mutex<Option<(u16, String)>>>,
    upload_error: Arc<Mutex<Option<String>>>,
}

impl MockProvider {
    /// Create a new mock provider of the given kind
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            replies: Arc::new(Mutex::new(vec![MockReply::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            recorded_uploads: Arc::new(Mutex::new(vec![])),
            send_error: Arc::new(Mutex::new(None)),
            upload_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply {
            text: text.into(),
            ..Default::default()
        })
    }

    /// Set a full reply
    pub fn with_reply(self, reply: MockReply) -> Self {
        {
            let mut replies = lock(&self.replies);
            replies.clear();
            replies.push(reply);
        }
        self
    }

    /// Queue multiple responses (returned in order)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        {
            let mut replies = lock(&self.replies);
            *replies = texts
                .into_iter()
                .map(|text| MockReply {
                    text,
                    ..Default::default()
                })
                .collect();
        }
        self
    }

    /// Make every `send` fail with an upstream server error
    pub fn with_send_error(self, status: u16, message: impl Into<String>) -> Self {
        *lock(&self.send_error) = Some((status, message.into()));
        self
    }

    /// Make every `upload_file` fail
    pub fn with_upload_error(self, message: impl Into<String>) -> Self {
        *lock(&self.upload_error) = Some(message.into());
        self
    }

    /// Number of `send` calls
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All requests passed to `send`
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> Option<ChatRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    /// All `upload_file` calls
    pub fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        lock(&self.recorded_uploads).clone()
    }

    fn next_reply(&self) -> MockReply {
        let mut replies = lock(&self.replies);
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies.first().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_requests).push(request);

        if let Some((status, message)) = lock(&self.send_error).clone() {
            return Err(ChatError::Api(ApiError::ServerError { status, message }));
        }

        let reply = self.next_reply();
        Ok(ChatReply {
            text: reply.text,
            usage: reply.usage,
        })
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await.ok();
        lock(&self.recorded_uploads).push(RecordedUpload {
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            display_name: display_name.to_string(),
            existed: bytes.is_some(),
            bytes: bytes.unwrap_or_default(),
        });

        if let Some(message) = lock(&self.upload_error).clone() {
            return Err(ChatError::Api(ApiError::ServerError {
                status: 500,
                message,
            }));
        }

        Ok(RemoteFile {
            uri: format!("mock://files/{}", display_name),
            mime_type: mime_type.to_string(),
        })
    }
}

/// A ProviderSource handing out shared mock providers
#[derive(Clone, Default)]
pub struct MockProviderSource {
    providers: Arc<Mutex<HashMap<ProviderKind, MockProvider>>>,
    unconfigured: Arc<Mutex<HashSet<ProviderKind>>>,
    resolve_count: Arc<AtomicUsize>,
    base_urls: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockProviderSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configured mock, keyed by its kind
    pub fn with_provider(self, provider: MockProvider) -> Self {
        lock(&self.providers).insert(provider.kind, provider);
        self
    }

    /// Resolving `kind` fails as if its API key were missing
    pub fn without_key(self, kind: ProviderKind) -> Self {
        lock(&self.unconfigured).insert(kind);
        self
    }

    /// The mock serving `kind` (created on first use)
    pub fn mock(&self, kind: ProviderKind) -> MockProvider {
        lock(&self.providers)
            .entry(kind)
            .or_insert_with(|| MockProvider::new(kind))
            .clone()
    }

    /// How many times a provider was resolved
    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }

    /// Base URL overrides passed on each resolve
    pub fn base_urls(&self) -> Vec<Option<String>> {
        lock(&self.base_urls).clone()
    }
}

impl ProviderSource for MockProviderSource {
    fn provider(
        &self,
        kind: ProviderKind,
        base_url_override: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.base_urls).push(base_url_override.map(str::to_string));

        if lock(&self.unconfigured).contains(&kind) {
            return Err(ChatError::Config(format!("No {} API key found.", kind)));
        }
        Ok(Arc::new(self.mock(kind)))
    }
}
