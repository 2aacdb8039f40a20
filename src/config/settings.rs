// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for chatdeck
//!
//! Handles loading and saving settings from ~/.chatdeck/config.toml

use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::provider::ProviderKind;

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.chatdeck/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// LLM provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default settings for new sessions and turns
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Conversation context settings
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Google Gemini configuration
    #[serde(default)]
    pub google: GoogleConfig,

    /// OpenAI (or compatible endpoint) configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Anthropic Claude configuration
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

/// Google-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_google_api_key_env")]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default = "default_google_model")]
    pub default_model: String,

    /// API root override (for proxies and tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// OpenAI-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default = "default_openai_model")]
    pub default_model: String,

    /// Base URL of an OpenAI-compatible server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Anthropic-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default = "default_anthropic_model")]
    pub default_model: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Defaults applied to new sessions and unspecified sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default provider for new sessions
    #[serde(default = "default_provider", deserialize_with = "lenient_provider")]
    pub provider: ProviderKind,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Default top-k (Google only)
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Conversation context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of most recent messages sent as context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

// Default value functions

fn default_google_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_google_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_provider() -> ProviderKind {
    ProviderKind::Google
}

/// Accept provider aliases and any casing; an unknown name falls back to
/// the default instead of failing the whole file.
fn lenient_provider<'de, D>(deserializer: D) -> std::result::Result<ProviderKind, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(name.parse().unwrap_or_else(|_| {
        tracing::warn!(provider = %name, "unknown default provider in settings, using google");
        default_provider()
    }))
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.8
}

fn default_top_k() -> u32 {
    40
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_history_limit() -> usize {
    30
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_google_api_key_env(),
            default_model: default_google_model(),
            base_url: None,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            default_model: default_openai_model(),
            base_url: None,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_anthropic_api_key_env(),
            default_model: default_anthropic_model(),
            base_url: None,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}
