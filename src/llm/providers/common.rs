// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{ApiError, ChatError};
use crate::llm::message::Message;

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Text to replay for a history entry. A file-only turn becomes a short
/// marker; an entry with nothing to say is dropped, since providers reject
/// empty content.
pub(crate) fn history_text(message: &Message) -> Option<String> {
    if !message.content.trim().is_empty() {
        return Some(message.content.clone());
    }
    message
        .file
        .as_ref()
        .map(|name| format!("[attached file: {}]", name))
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> ChatError {
    ChatError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}

/// Rate-limit error, preferring the server's Retry-After hint.
pub(crate) fn rate_limited(retry_after: Option<u64>, fallback_secs: u32) -> ChatError {
    let secs = retry_after
        .and_then(|s| u32::try_from(s).ok())
        .unwrap_or(fallback_secs);
    ChatError::Api(ApiError::RateLimited(secs))
}

/// Classify a transport-level reqwest failure.
pub(crate) fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Api(ApiError::Timeout)
    } else if err.is_connect() {
        ChatError::Api(ApiError::Network(err.to_string()))
    } else {
        ChatError::Http(err)
    }
}

/// A body that deserialized badly is an invalid response, not a local bug.
pub(crate) fn decode_error(err: reqwest::Error) -> ChatError {
    ChatError::Api(ApiError::InvalidResponse(err.to_string()))
}

/// Join an API root and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
