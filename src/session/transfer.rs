// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session export/import and flat-file persistence
//!
//! The export bundle (`{"version": "v3", "sessions": [...]}`) doubles as
//! the on-disk snapshot format.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::normalize_messages;
use super::store::{Session, SessionDefaults, SessionStore};
use crate::error::{ChatError, Result};
use crate::llm::provider::ProviderKind;

pub const EXPORT_VERSION: &str = "v3";

/// Title of imported sessions that carry none
pub const IMPORTED_TITLE: &str = "Imported Chat";

/// Serialized form of one or more sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub version: String,
    pub sessions: Vec<Session>,
}

impl ExportBundle {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            sessions,
        }
    }
}

/// Pick the session entries out of an import payload: a bundle with a
/// `sessions` list, a single session object with `messages`, or a bare list.
fn import_entries(payload: &Value) -> &[Value] {
    match payload {
        Value::Object(map) => {
            if let Some(sessions) = map.get("sessions") {
                sessions.as_array().map(Vec::as_slice).unwrap_or(&[])
            } else if map.contains_key("messages") {
                std::slice::from_ref(payload)
            } else {
                &[]
            }
        }
        Value::Array(list) => list.as_slice(),
        _ => &[],
    }
}

fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl SessionStore {
    /// Export one session
    pub fn export_session(&self, id: &str) -> Result<ExportBundle> {
        let session = self.require(id)?;
        Ok(ExportBundle::new(vec![session.clone()]))
    }

    /// Export every session, most recently updated first
    pub fn export_all(&self) -> ExportBundle {
        ExportBundle::new(self.sessions_by_recency().into_iter().cloned().collect())
    }

    /// Import sessions from an untrusted payload. Each imported session gets
    /// a fresh id; messages go through the normalizer. Returns the new ids.
    pub fn import(&mut self, payload: &Value) -> Result<Vec<String>> {
        let mut imported = Vec::new();

        for entry in import_entries(payload) {
            let Some(object) = entry.as_object() else {
                continue;
            };

            let title = object
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(IMPORTED_TITLE);
            let provider = object
                .get("provider")
                .and_then(Value::as_str)
                .and_then(|p| match p.parse::<ProviderKind>() {
                    Ok(kind) => Some(kind),
                    Err(_) => {
                        tracing::warn!(provider = p, "unknown provider in import, using default");
                        None
                    }
                });
            let model = object.get("model").and_then(Value::as_str);

            let mut session = self.build_session(Some(title), provider, model);
            session.messages = object
                .get("messages")
                .map(normalize_messages)
                .unwrap_or_default();
            if let Some(created) = parse_time(object.get("created_at")) {
                session.created_at = created;
            }
            session.updated_at = parse_time(object.get("updated_at"))
                .unwrap_or_else(Utc::now)
                .max(session.created_at);

            imported.push(self.insert(session).id.clone());
        }

        if imported.is_empty() {
            return Err(ChatError::InvalidInput(
                "No sessions found to import.".to_string(),
            ));
        }

        tracing::info!(count = imported.len(), "imported sessions");
        Ok(imported)
    }

    /// Write every session to `path` as an export bundle
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.export_all())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a snapshot written by [`SessionStore::save_to`]. A missing file
    /// gives a fresh store. A file that is not a valid bundle is moved aside
    /// to `<name>.bak-<timestamp>` so a later save cannot overwrite it, then
    /// salvaged through the lenient import path where possible.
    pub fn load_from(path: &Path, defaults: SessionDefaults) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(defaults));
        }

        let content = std::fs::read_to_string(path)?;
        if let Ok(bundle) = serde_json::from_str::<ExportBundle>(&content) {
            return Ok(Self::from_sessions(defaults, bundle.sessions));
        }

        let backup = set_aside(path)?;
        tracing::warn!(
            path = %path.display(),
            backup = %backup.display(),
            "session snapshot is not a valid bundle, salvaging"
        );
        let salvaged = serde_json::from_str::<Value>(&content)
            .ok()
            .and_then(|payload| {
                let mut store = Self::from_sessions(defaults.clone(), Vec::new());
                let placeholder = store.active_id()?.to_string();
                store.import(&payload).ok()?;
                store.delete(&placeholder).ok()?;
                Some(store)
            });

        Ok(salvaged.unwrap_or_else(|| Self::new(defaults)))
    }
}

/// Rename `path` to a timestamped sibling and return the new path
fn set_aside(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sessions.json".to_string());
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let backup = path.with_file_name(format!("{}.bak-{}", name, stamp));
    std::fs::rename(path, &backup)?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Message;
    use serde_json::json;

    fn store() -> SessionStore {
        SessionStore::new(SessionDefaults::default())
    }

    #[test]
    fn test_import_single_session_payload() {
        let mut store = store();
        let ids = store
            .import(&json!({"messages": [
                {"role": "user", "content": "hi"},
                {"role": "system", "content": "ignored"}
            ]}))
            .unwrap();

        assert_eq!(ids.len(), 1);
        let session = store.get(&ids[0]).unwrap();
        assert_eq!(session.title, IMPORTED_TITLE);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "hi");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_import_wrapper_and_list() {
        let mut store = store();
        let ids = store
            .import(&json!({"version": "v2", "sessions": [
                {"title": "A", "provider": "anthropic", "messages": []},
                {"title": "B", "provider": "openai", "model": "gpt-4.1", "messages": []}
            ]}))
            .unwrap();
        assert_eq!(ids.len(), 2);
        let a = store.get(&ids[0]).unwrap();
        assert_eq!(a.provider, ProviderKind::Anthropic);
        assert_eq!(a.model, "claude-3-5-sonnet-20241022");
        assert_eq!(store.get(&ids[1]).unwrap().model, "gpt-4.1");

        let ids = store
            .import(&json!([{"title": "C", "messages": []}, "junk"]))
            .unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_import_empty_is_rejected() {
        let mut store = store();
        for payload in [
            json!({}),
            json!({"sessions": []}),
            json!([]),
            json!("text"),
            json!([1, 2]),
        ] {
            let err = store.import(&payload).unwrap_err();
            assert!(matches!(err, ChatError::InvalidInput(_)));
            assert_eq!(err.status_code(), 400);
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_import_unknown_provider_uses_default() {
        let mut store = store();
        let ids = store
            .import(&json!({"provider": "mistral", "messages": []}))
            .unwrap();
        let session = store.get(&ids[0]).unwrap();
        assert_eq!(session.provider, ProviderKind::Google);
        assert_eq!(session.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_import_timestamps() {
        let mut store = store();
        let ids = store
            .import(&json!({
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-04-01T10:00:00Z",
                "messages": []
            }))
            .unwrap();
        let session = store.get(&ids[0]).unwrap();
        assert_eq!(session.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(session.updated_at >= session.created_at);
    }

    #[test]
    fn test_export_then_import_reproduces_contents() {
        let mut source = store();
        let id = source.active_id().unwrap().to_string();
        source.append(&id, Message::user("first question")).unwrap();
        source.append(&id, Message::assistant("first answer")).unwrap();
        let other = source.create(Some("Other"), None, None).id.clone();
        source.append(&other, Message::user("second")).unwrap();

        let exported = serde_json::to_value(source.export_all()).unwrap();
        assert_eq!(exported["version"], "v3");

        let mut target = store();
        let ids = target.import(&exported).unwrap();
        assert_eq!(ids.len(), 2);

        let mut contents: Vec<Vec<String>> = ids
            .iter()
            .map(|id| {
                target
                    .get(id)
                    .unwrap()
                    .messages
                    .iter()
                    .map(|m| m.content.clone())
                    .collect()
            })
            .collect();
        contents.sort();
        assert_eq!(
            contents,
            vec![
                vec!["first question".to_string(), "first answer".to_string()],
                vec!["second".to_string()],
            ]
        );
    }

    #[test]
    fn test_export_session_not_found() {
        let store = store();
        assert!(matches!(
            store.export_session("missing"),
            Err(ChatError::SessionNotFound(_))
        ));
        let id = store.active_id().unwrap();
        assert_eq!(store.export_session(id).unwrap().sessions.len(), 1);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.json");

        let mut store = store();
        let id = store.active_id().unwrap().to_string();
        store.append(&id, Message::user("persist me")).unwrap();
        store.save_to(&path).unwrap();

        let loaded = SessionStore::load_from(&path, SessionDefaults::default()).unwrap();
        assert_eq!(loaded.len(), 1);
        let session = loaded.get(&id).unwrap();
        assert_eq!(session.messages[0].content, "persist me");
        assert_eq!(session.title, "persist me");
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("none.json");
        assert_eq!(
            SessionStore::load_from(&missing, SessionDefaults::default())
                .unwrap()
                .len(),
            1
        );

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert_eq!(
            SessionStore::load_from(&corrupt, SessionDefaults::default())
                .unwrap()
                .len(),
            1
        );
        assert!(!corrupt.exists());
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("corrupt.json.bak-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).unwrap(), "{not json");
    }

    #[test]
    fn test_load_salvages_legacy_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"[{"title": "Old", "messages": [{"role": "user", "content": "hey"}]}]"#,
        )
        .unwrap();

        let store = SessionStore::load_from(&path, SessionDefaults::default()).unwrap();
        assert_eq!(store.len(), 1);
        let session = store.get(store.active_id().unwrap()).unwrap();
        assert_eq!(session.title, "Old");
        assert_eq!(session.messages.len(), 1);
    }
}
