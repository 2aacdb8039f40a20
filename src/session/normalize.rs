// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Coercion of untrusted message payloads (imports, older exports) into
//! [`Message`]s. Never fails: bad entries are dropped, bad fields defaulted.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::llm::message::{Message, Role, UsageRecord};

/// Normalize a JSON array of message-like objects.
///
/// Entries that are not objects, or whose role is not exactly `user` or
/// `assistant`, are dropped. Order is preserved.
pub fn normalize_messages(value: &Value) -> Vec<Message> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries.iter().filter_map(normalize_message).collect()
}

fn normalize_message(entry: &Value) -> Option<Message> {
    let object = entry.as_object()?;
    let role = object.get("role").and_then(Value::as_str).and_then(Role::parse)?;

    let usage = object
        .get("usage")
        .filter(|v| !v.is_null())
        .or_else(|| object.get("tokens"))
        .and_then(coerce_usage);

    Some(Message {
        role,
        content: coerce_content(object.get("content")),
        timestamp: coerce_timestamp(object.get("timestamp")),
        file: object.get("file").and_then(Value::as_str).map(str::to_string),
        usage,
    })
}

fn coerce_content(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn coerce_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn coerce_usage(value: &Value) -> Option<UsageRecord> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_array_is_empty() {
        assert!(normalize_messages(&json!({"role": "user"})).is_empty());
        assert!(normalize_messages(&json!("hello")).is_empty());
        assert!(normalize_messages(&Value::Null).is_empty());
    }

    #[test]
    fn test_drops_bad_entries_and_roles() {
        let messages = normalize_messages(&json!([
            {"role": "system", "content": "be nice"},
            "just a string",
            42,
            {"role": "User", "content": "wrong case"},
            {"content": "no role"},
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"}
        ]));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_content_coercion() {
        let messages = normalize_messages(&json!([
            {"role": "user"},
            {"role": "user", "content": null},
            {"role": "user", "content": 12},
            {"role": "user", "content": true},
            {"role": "user", "content": ["a", 1]}
        ]));
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["", "", "12", "true", r#"["a",1]"#]);
    }

    #[test]
    fn test_timestamp_parsed_or_now() {
        let before = Utc::now();
        let messages = normalize_messages(&json!([
            {"role": "user", "content": "a", "timestamp": "2024-03-01T12:30:00.123456Z"},
            {"role": "user", "content": "b", "timestamp": "yesterday"},
            {"role": "user", "content": "c"}
        ]));
        assert_eq!(
            messages[0].timestamp.to_rfc3339(),
            "2024-03-01T12:30:00.123456+00:00"
        );
        assert!(messages[1].timestamp >= before);
        assert!(messages[2].timestamp >= before);
    }

    #[test]
    fn test_file_and_usage() {
        let messages = normalize_messages(&json!([
            {"role": "user", "content": "see", "file": "report.pdf"},
            {"role": "user", "content": "x", "file": 7},
            {"role": "assistant", "content": "ok", "tokens": {"prompt": 3, "output": 1, "total": null}},
            {"role": "assistant", "content": "ok", "usage": {"prompt": 1, "output": 1, "total": 2}},
            {"role": "assistant", "content": "ok", "tokens": {"prompt": "many"}},
            {"role": "assistant", "content": "ok", "tokens": "n/a"}
        ]));
        assert_eq!(messages[0].file.as_deref(), Some("report.pdf"));
        assert!(messages[1].file.is_none());
        assert_eq!(
            messages[2].usage,
            Some(UsageRecord {
                prompt: Some(3),
                output: Some(1),
                total: None
            })
        );
        assert_eq!(messages[3].usage, Some(UsageRecord::new(1, 1, 2)));
        assert!(messages[4].usage.is_none());
        assert!(messages[5].usage.is_none());
    }
}
