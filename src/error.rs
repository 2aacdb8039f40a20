// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for chatdeck
//!
//! This module defines all error types used throughout the application,
//! plus the mapping from an error to the HTTP-equivalent status carried by
//! a failed chat turn.

use serde::Serialize;
use thiserror::Error;

/// Main error type for chatdeck operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feature not available for the selected provider
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// File staging or remote upload failed
    #[error("Failed to process file: {0}")]
    Upload(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The provider rejected the request we sent
    #[error("Request rejected: {0}")]
    InvalidRequest(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

/// Coarse classification of a failed turn, reported alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty turn, bad import payload and similar caller mistakes
    Validation,
    /// Provider cannot serve the requested feature
    Unsupported,
    /// Unknown session
    NotFound,
    /// Missing key or other configuration problem
    Configuration,
    /// File staging or remote upload failed
    Upload,
    /// The provider failed or answered with something unusable
    Upstream,
    /// Local I/O or serialization failure
    Internal,
}

impl ChatError {
    /// Classify this error for the response envelope
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ChatError::InvalidInput(_) => FailureKind::Validation,
            ChatError::Unsupported(_) => FailureKind::Unsupported,
            ChatError::SessionNotFound(_) => FailureKind::NotFound,
            ChatError::Config(_) | ChatError::Toml(_) => FailureKind::Configuration,
            ChatError::Upload(_) => FailureKind::Upload,
            ChatError::Api(_) | ChatError::Http(_) => FailureKind::Upstream,
            ChatError::Io(_) | ChatError::Json(_) => FailureKind::Internal,
        }
    }

    /// HTTP-equivalent status code for this error
    pub fn status_code(&self) -> u16 {
        match self.failure_kind() {
            FailureKind::Validation
            | FailureKind::Unsupported
            | FailureKind::Configuration
            | FailureKind::Upload => 400,
            FailureKind::NotFound => 404,
            FailureKind::Upstream => 502,
            FailureKind::Internal => 500,
        }
    }
}

/// Result type alias for chatdeck operations
pub type Result<T> = std::result::Result<T, ChatError>;

impl From<toml::de::Error> for ChatError {
    fn from(err: toml::de::Error) -> Self {
        ChatError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for ChatError {
    fn from(err: toml::ser::Error) -> Self {
        ChatError::Toml(err.to_string())
    }
}
