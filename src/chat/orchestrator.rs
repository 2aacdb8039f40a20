// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Single-turn chat orchestration
//!
//! One call to [`ChatOrchestrator::chat`] resolves the session and route,
//! validates the turn, stages and uploads an attachment when there is one,
//! invokes the adapter and records the exchange. The session is only
//! written on success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::upload::{FileUpload, StagedUpload};
use crate::config::Settings;
use crate::error::{ChatError, FailureKind, Result};
use crate::llm::factory::ProviderSource;
use crate::llm::message::{history_window, Message, UsageRecord};
use crate::llm::params::{GenerationParameters, RawParameters};
use crate::llm::provider::{ChatProvider, ChatRequest, ProviderKind, RemoteFile};
use crate::session::{ExportBundle, Session, SessionStore, SessionSummary, TurnRecord};

const EMPTY_TURN_MESSAGE: &str = "Please enter a message or attach a file.";
const ATTACHMENT_UNSUPPORTED_MESSAGE: &str = "File uploads are only supported for Google GenAI.";

/// Input of one chat turn; every field except the message is optional
#[derive(Debug, Clone, Default)]
pub struct ChatTurnRequest {
    pub message: String,
    pub file: Option<FileUpload>,
    pub session_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub params: RawParameters,
    pub openai_base_url: Option<String>,
}

impl ChatTurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_params(mut self, params: RawParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }
}

/// Successful turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply: String,
    /// Name of the attached file, echoed back
    pub file_preview: Option<String>,
    pub session_id: String,
    pub session: Session,
    pub usage: UsageRecord,
}

/// Failed turn, shaped like a reply so it can be shown in the transcript
#[derive(Debug, Clone, Serialize)]
pub struct TurnFailure {
    pub reply: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TurnOutcome {
    Success(TurnReply),
    Failure(TurnFailure),
}

/// A turn result with its HTTP-equivalent status
#[derive(Debug, Clone, Serialize)]
pub struct TurnEnvelope {
    pub status: u16,
    pub body: TurnOutcome,
}

impl TurnEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self.body, TurnOutcome::Success(_))
    }

    fn failure(err: &ChatError) -> Self {
        Self {
            status: err.status_code(),
            body: TurnOutcome::Failure(TurnFailure {
                reply: failure_message(err),
                kind: err.failure_kind(),
            }),
        }
    }
}

/// Message shown to the user for a failed turn
pub fn failure_message(err: &ChatError) -> String {
    match err {
        ChatError::InvalidInput(msg) | ChatError::Unsupported(msg) | ChatError::Config(msg) => {
            msg.clone()
        }
        ChatError::Upload(_) => err.to_string(),
        ChatError::SessionNotFound(_) => "Session not found.".to_string(),
        other => format!("Error: {}", other),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Drives chat turns and owns the session store
pub struct ChatOrchestrator {
    settings: Arc<Settings>,
    store: SessionStore,
    providers: Arc<dyn ProviderSource>,
    upload_dir: PathBuf,
}

impl ChatOrchestrator {
    pub fn new(
        settings: Arc<Settings>,
        store: SessionStore,
        providers: Arc<dyn ProviderSource>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            store,
            providers,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Run one turn and wrap the outcome in an envelope
    pub async fn chat(&mut self, request: ChatTurnRequest) -> TurnEnvelope {
        match self.try_chat(request).await {
            Ok(reply) => TurnEnvelope {
                status: 200,
                body: TurnOutcome::Success(reply),
            },
            Err(err) => {
                tracing::warn!(status = err.status_code(), error = %err, "chat turn failed");
                TurnEnvelope::failure(&err)
            }
        }
    }

    /// Run one turn
    pub async fn try_chat(&mut self, request: ChatTurnRequest) -> Result<TurnReply> {
        let session_id = self.resolve_session(request.session_id.as_deref());
        let (provider, model) = self.resolve_route(&session_id, &request)?;

        let user_text = request.message.trim().to_string();
        let file = request.file.filter(|f| !f.is_empty());

        if user_text.is_empty() && file.is_none() {
            return Err(ChatError::InvalidInput(EMPTY_TURN_MESSAGE.to_string()));
        }
        if file.is_some() && !provider.supports_attachments() {
            return Err(ChatError::Unsupported(
                ATTACHMENT_UNSUPPORTED_MESSAGE.to_string(),
            ));
        }

        let base_url = match provider {
            ProviderKind::OpenAi => non_blank(request.openai_base_url.as_deref()),
            _ => None,
        };
        let adapter = self.providers.provider(provider, base_url)?;

        let attachment = match file {
            Some(ref file) => Some(self.upload(adapter.as_ref(), file).await?),
            None => None,
        };

        let session = self.store.require(&session_id)?;
        let history =
            history_window(&session.messages, self.settings.conversation.history_limit).to_vec();
        let params = GenerationParameters::sanitize(
            &request.params,
            &self.settings.defaults,
            provider.max_tokens_ceiling(),
        );

        tracing::info!(
            session = %session_id,
            provider = %provider,
            model = %model,
            history = history.len(),
            attachment = attachment.is_some(),
            "sending chat turn"
        );

        let mut chat_request =
            ChatRequest::new(model.clone(), history, user_text.clone()).with_params(params);
        if let Some(remote) = attachment {
            chat_request = chat_request.with_attachment(remote);
        }
        let reply = adapter.send(chat_request).await?;

        let usage = reply
            .usage
            .unwrap_or_else(|| UsageRecord::estimated(&user_text, &reply.text));
        let file_name = file.map(|f| f.file_name);

        let session = self.store.record_turn(
            &session_id,
            TurnRecord {
                user: Message::user(user_text).with_file(file_name.clone()),
                assistant: Message::assistant(reply.text.clone()).with_usage(usage),
                provider,
                model,
            },
        )?;

        Ok(TurnReply {
            reply: reply.text,
            file_preview: file_name,
            session_id,
            session: session.clone(),
            usage,
        })
    }

    /// Existing session id, or a freshly created session
    fn resolve_session(&mut self, requested: Option<&str>) -> String {
        if let Some(id) = non_blank(requested) {
            if self.store.get(id).is_some() {
                return id.to_string();
            }
            tracing::info!(requested = id, "unknown session, starting a new one");
        }
        self.store.create(None, None, None).id.clone()
    }

    /// Provider override, else the session's. Model override, else the
    /// session's model when the provider is unchanged, else the provider's
    /// default model.
    fn resolve_route(
        &self,
        session_id: &str,
        request: &ChatTurnRequest,
    ) -> Result<(ProviderKind, String)> {
        let session = self.store.require(session_id)?;
        let provider = match non_blank(request.provider.as_deref()) {
            Some(name) => name.parse::<ProviderKind>()?,
            None => session.provider,
        };
        let model = match non_blank(request.model.as_deref()) {
            Some(model) => model.to_string(),
            None if provider == session.provider => session.model.clone(),
            None => self.store.defaults().model_for(provider).to_string(),
        };
        Ok((provider, model))
    }

    /// Stage, upload and always remove the temporary copy
    async fn upload(&self, adapter: &dyn ChatProvider, file: &FileUpload) -> Result<RemoteFile> {
        let staged = StagedUpload::stage(&self.upload_dir, file).await?;
        let result = adapter
            .upload_file(staged.path(), &file.mime_type(), &file.file_name)
            .await;
        staged.cleanup().await;

        result.map_err(|e| match e {
            ChatError::Upload(_) => e,
            other => ChatError::Upload(other.to_string()),
        })
    }

    // Session management

    pub fn create_session(
        &mut self,
        title: Option<&str>,
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> Session {
        self.store.create(title, provider, model).clone()
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list()
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.store.require(id).cloned()
    }

    pub fn rename_session(&mut self, id: &str, title: &str) -> Result<Session> {
        self.store.rename(id, title).cloned()
    }

    pub fn clear_session(&mut self, id: &str) -> Result<Session> {
        self.store.clear(id).cloned()
    }

    /// Delete a session and return the remaining summaries
    pub fn delete_session(&mut self, id: &str) -> Result<Vec<SessionSummary>> {
        self.store.delete(id)?;
        Ok(self.store.list())
    }

    pub fn export_session(&self, id: &str) -> Result<ExportBundle> {
        self.store.export_session(id)
    }

    pub fn export_all(&self) -> ExportBundle {
        self.store.export_all()
    }

    pub fn import_sessions(&mut self, payload: &serde_json::Value) -> Result<Vec<String>> {
        self.store.import(payload)
    }

    /// Persist all sessions
    pub fn save_sessions(&self, path: &Path) -> Result<()> {
        self.store.save_to(path)
    }
}
