// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::{Map, Value};

/// Top-level keys of the old flat `.env`-style config and where they live now.
const LEGACY_KEYS: &[(&str, &[&str])] = &[
    ("GOOGLE_API_KEY", &["providers", "google", "api_key"]),
    ("GEMINI_MODEL", &["providers", "google", "default_model"]),
    ("OPENAI_API_KEY", &["providers", "openai", "api_key"]),
    ("OPENAI_BASE_URL", &["providers", "openai", "base_url"]),
    ("ANTHROPIC_API_KEY", &["providers", "anthropic", "api_key"]),
    ("CHAT_PROVIDER", &["defaults", "provider"]),
];

/// Lift legacy flat keys into the structured layout. A structured value
/// already present wins over its legacy counterpart.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let Value::Object(mut root) = value else {
        return value;
    };

    for (legacy, target) in LEGACY_KEYS {
        let Some(old) = root.remove(*legacy) else {
            continue;
        };
        let Some(text) = old.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let text = if *legacy == "CHAT_PROVIDER" {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        insert_if_absent(&mut root, target, Value::String(text));
    }

    Value::Object(root)
}

fn insert_if_absent(node: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            node.entry(last.to_string()).or_insert(value);
        }
        [first, rest @ ..] => {
            let child = node
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            // A scalar squatting on a table name is left alone
            if let Value::Object(map) = child {
                insert_if_absent(map, rest, value);
            }
        }
    }
}

/// Flatten a document into `(path, leaf)` pairs. Arrays count as leaves.
pub(super) fn leaves(value: Value) -> Vec<(Vec<String>, Value)> {
    fn walk(prefix: &mut Vec<String>, value: Value, out: &mut Vec<(Vec<String>, Value)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    prefix.push(key);
                    walk(prefix, child, out);
                    prefix.pop();
                }
            }
            leaf => out.push((prefix.clone(), leaf)),
        }
    }

    let mut out = Vec::new();
    walk(&mut Vec::new(), value, &mut out);
    out
}

/// Set `path` inside `root`, replacing scalars that sit on the way.
pub(super) fn set_path(root: &mut Value, path: &[String], leaf: Value) {
    match path.split_first() {
        None => *root = leaf,
        Some((first, rest)) => {
            if !root.is_object() {
                *root = Value::Object(Map::new());
            }
            if let Value::Object(map) = root {
                let child = map.entry(first.clone()).or_insert(Value::Null);
                set_path(child, rest, leaf);
            }
        }
    }
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}
