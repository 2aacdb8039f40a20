// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session store implementation
//!
//! Owns every conversation. All mutation goes through this type so the
//! store's invariants hold: at least one session always exists, and a
//! session's `updated_at` never moves backwards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ChatError, Result};
use crate::llm::message::{Message, Role};
use crate::llm::provider::ProviderKind;

/// Title given to sessions until their first user message
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// Words of the first user message used as the automatic title
const AUTOTITLE_WORDS: usize = 6;

/// A named conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub provider: ProviderKind,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Listing entry for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub provider: ProviderKind,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Provider and per-provider models given to new sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub provider: ProviderKind,
    pub google_model: String,
    pub openai_model: String,
    pub anthropic_model: String,
}

/// Everything written by one successful chat turn
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub user: Message,
    pub assistant: Message,
    pub provider: ProviderKind,
    pub model: String,
}

impl Session {
    /// Create a new empty session
    pub fn new(title: impl Into<String>, provider: ProviderKind, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            provider,
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: vec![],
        }
    }

    /// Summary for listings
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            provider: self.provider,
            model: self.model.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }

    /// Update the last active timestamp, never moving it backwards
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }

    /// Take the first words of `user_text` as title while the placeholder
    /// is still in place
    fn maybe_autotitle(&mut self, user_text: &str) {
        if self.title != PLACEHOLDER_TITLE {
            return;
        }
        let words: Vec<&str> = user_text.split_whitespace().take(AUTOTITLE_WORDS).collect();
        if !words.is_empty() {
            self.title = words.join(" ");
        }
    }
}

impl SessionDefaults {
    /// Defaults as configured in settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            provider: settings.defaults.provider,
            google_model: settings.default_model(ProviderKind::Google).to_string(),
            openai_model: settings.default_model(ProviderKind::OpenAi).to_string(),
            anthropic_model: settings.default_model(ProviderKind::Anthropic).to_string(),
        }
    }

    /// Default model of a provider
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Google => &self.google_model,
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Anthropic => &self.anthropic_model,
        }
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// In-memory session store
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    defaults: SessionDefaults,
}

impl SessionStore {
    /// Create a store holding one fresh session
    pub fn new(defaults: SessionDefaults) -> Self {
        Self::from_sessions(defaults, Vec::new())
    }

    /// Build a store from existing sessions (a replacement is created when
    /// the list is empty)
    pub fn from_sessions(defaults: SessionDefaults, sessions: Vec<Session>) -> Self {
        let mut store = Self {
            sessions: sessions.into_iter().map(|s| (s.id.clone(), s)).collect(),
            defaults,
        };
        store.ensure_one();
        store
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Create a session. Missing title, provider or model fall back to the
    /// placeholder title, the default provider and that provider's default
    /// model.
    pub fn create(
        &mut self,
        title: Option<&str>,
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> &Session {
        let session = self.build_session(title, provider, model);
        self.insert(session)
    }

    pub(crate) fn build_session(
        &self,
        title: Option<&str>,
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> Session {
        let provider = provider.unwrap_or(self.defaults.provider);
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(PLACEHOLDER_TITLE);
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.defaults.model_for(provider));
        Session::new(title, provider, model)
    }

    /// Insert a fully built session
    pub(crate) fn insert(&mut self, session: Session) -> &Session {
        let id = session.id.clone();
        self.sessions.entry(id).or_insert(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Get a session or a not-found error
    pub fn require(&self, id: &str) -> Result<&Session> {
        self.sessions
            .get(id)
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
    }

    /// Resolve a full id or a unique id prefix
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&Session> {
        let prefix = prefix.trim();
        if let Some(session) = self.sessions.get(prefix) {
            return Ok(session);
        }
        let mut matches = self
            .sessions
            .values()
            .filter(|s| !prefix.is_empty() && s.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(session), None) => Ok(session),
            (Some(_), Some(_)) => Err(ChatError::InvalidInput(format!(
                "Session id '{}' is ambiguous",
                prefix
            ))),
            _ => Err(ChatError::SessionNotFound(prefix.to_string())),
        }
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
    }

    /// Sessions, most recently updated first
    pub fn sessions_by_recency(&self) -> Vec<&Session> {
        let mut sorted: Vec<&Session> = self.sessions.values().collect();
        sorted.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
    }

    /// Summaries, most recently updated first
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions_by_recency()
            .into_iter()
            .map(Session::summary)
            .collect()
    }

    /// The most recently updated session
    pub fn active_id(&self) -> Option<&str> {
        self.sessions_by_recency().first().map(|s| s.id.as_str())
    }

    /// Rename a session; a blank title leaves it unchanged
    pub fn rename(&mut self, id: &str, title: &str) -> Result<&Session> {
        let session = self.require_mut(id)?;
        let title = title.trim();
        if !title.is_empty() {
            session.title = title.to_string();
            session.touch();
        }
        Ok(&*session)
    }

    /// Drop every message of a session
    pub fn clear(&mut self, id: &str) -> Result<&Session> {
        let session = self.require_mut(id)?;
        session.messages.clear();
        session.touch();
        Ok(&*session)
    }

    /// Delete a session. Deleting the last one creates an empty replacement.
    pub fn delete(&mut self, id: &str) -> Result<Session> {
        let removed = self
            .sessions
            .remove(id)
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))?;
        self.ensure_one();
        Ok(removed)
    }

    /// Append a message and bump the session
    pub fn append(&mut self, id: &str, message: Message) -> Result<()> {
        let session = self.require_mut(id)?;
        if message.role == Role::User {
            session.maybe_autotitle(&message.content);
        }
        session.messages.push(message);
        session.touch();
        Ok(())
    }

    /// Record a completed turn: both messages, the route used, a bump and
    /// auto-titling, all or nothing
    pub fn record_turn(&mut self, id: &str, turn: TurnRecord) -> Result<&Session> {
        let session = self.require_mut(id)?;
        session.maybe_autotitle(&turn.user.content);
        session.messages.push(turn.user);
        session.messages.push(turn.assistant);
        session.provider = turn.provider;
        session.model = turn.model;
        session.touch();
        Ok(&*session)
    }

    fn ensure_one(&mut self) {
        if self.sessions.is_empty() {
            let session = self.build_session(None, None, None);
            tracing::debug!(id = %session.id, "created replacement session");
            self.insert(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::UsageRecord;

    fn store() -> SessionStore {
        SessionStore::new(SessionDefaults::default())
    }

    #[test]
    fn test_new_store_has_one_session() {
        let store = store();
        assert_eq!(store.len(), 1);
        let id = store.active_id().unwrap();
        let session = store.get(id).unwrap();
        assert_eq!(session.title, PLACEHOLDER_TITLE);
        assert_eq!(session.provider, ProviderKind::Google);
        assert_eq!(session.model, "gemini-2.5-flash");
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_create_uses_provider_default_model() {
        let mut store = store();
        let session = store.create(Some("Work"), Some(ProviderKind::Anthropic), None);
        assert_eq!(session.title, "Work");
        assert_eq!(session.model, "claude-3-5-sonnet-20241022");
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn test_create_blank_title_is_placeholder() {
        let mut store = store();
        let session = store.create(Some("   "), None, Some("gemini-2.0-flash"));
        assert_eq!(session.title, PLACEHOLDER_TITLE);
        assert_eq!(session.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_list_orders_by_updated_desc() {
        let mut store = store();
        let first = store.active_id().unwrap().to_string();
        let second = store.create(Some("Second"), None, None).id.clone();
        store.append(&first, Message::user("bump")).unwrap();

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first);
        assert_eq!(list[0].message_count, 1);
        assert_eq!(list[1].id, second);
        assert_eq!(store.active_id(), Some(first.as_str()));
    }

    #[test]
    fn test_rename_ignores_blank() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        store.rename(&id, "  Trip plans ").unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Trip plans");
        store.rename(&id, "   ").unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Trip plans");
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut store = store();
        assert!(matches!(
            store.rename("nope", "x"),
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(matches!(store.clear("nope"), Err(ChatError::SessionNotFound(_))));
        assert!(matches!(store.delete("nope"), Err(ChatError::SessionNotFound(_))));
        assert!(store.append("nope", Message::user("x")).is_err());
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_clear_empties_and_bumps() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        store.append(&id, Message::user("hi")).unwrap();
        let before = store.get(&id).unwrap().updated_at;
        let session = store.clear(&id).unwrap();
        assert!(session.messages.is_empty());
        assert!(session.updated_at >= before);
    }

    #[test]
    fn test_delete_last_creates_replacement() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(store.len(), 1);
        assert_ne!(store.active_id().unwrap(), id);
    }

    #[test]
    fn test_delete_non_last_keeps_others() {
        let mut store = store();
        let keep = store.active_id().unwrap().to_string();
        let drop = store.create(None, None, None).id.clone();
        store.delete(&drop).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&keep).is_some());
    }

    #[test]
    fn test_autotitle_first_six_words_once() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        store
            .append(&id, Message::user("Hello there, how are you today friend"))
            .unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Hello there, how are you today");

        store.append(&id, Message::user("Completely different words")).unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Hello there, how are you today");
    }

    #[test]
    fn test_autotitle_skips_empty_and_assistant() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        store.append(&id, Message::assistant("Welcome!")).unwrap();
        store.append(&id, Message::user("   ")).unwrap();
        assert_eq!(store.get(&id).unwrap().title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_autotitle_keeps_custom_title() {
        let mut store = store();
        let id = store.create(Some("Mine"), None, None).id.clone();
        store.append(&id, Message::user("some words here")).unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Mine");
    }

    #[test]
    fn test_record_turn() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        let session = store
            .record_turn(
                &id,
                TurnRecord {
                    user: Message::user("What is Rust?").with_file(Some("notes.txt".to_string())),
                    assistant: Message::assistant("A language.")
                        .with_usage(UsageRecord::new(3, 2, 5)),
                    provider: ProviderKind::OpenAi,
                    model: "gpt-4o".to_string(),
                },
            )
            .unwrap();

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].file.as_deref(), Some("notes.txt"));
        assert_eq!(session.messages[1].usage, Some(UsageRecord::new(3, 2, 5)));
        assert_eq!(session.provider, ProviderKind::OpenAi);
        assert_eq!(session.model, "gpt-4o");
        assert_eq!(session.title, "What is Rust?");
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut session = Session::new("t", ProviderKind::Google, "m");
        let future = Utc::now() + chrono::Duration::days(1);
        session.updated_at = future;
        session.touch();
        assert_eq!(session.updated_at, future);
    }

    #[test]
    fn test_find_by_prefix() {
        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        assert_eq!(store.find_by_prefix(&id).unwrap().id, id);
        assert_eq!(store.find_by_prefix(&id[..8]).unwrap().id, id);
        assert!(matches!(
            store.find_by_prefix("zzzz"),
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(store.find_by_prefix("").is_err());

        let other = store.create(None, None, None).id.clone();
        assert_eq!(store.find_by_prefix(&other).unwrap().id, other);
        assert_eq!(store.find_by_prefix(&id).unwrap().id, id);
    }
}
