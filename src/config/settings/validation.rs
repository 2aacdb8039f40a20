// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ChatError, Result};
use crate::llm::provider::ProviderKind;

use super::Settings;

/// Treat blank values the same as missing ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    /// Get the API key for a provider, checking env var first.
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        let (env_name, stored) = match kind {
            ProviderKind::Google => (
                &self.providers.google.api_key_env,
                &self.providers.google.api_key,
            ),
            ProviderKind::OpenAi => (
                &self.providers.openai.api_key_env,
                &self.providers.openai.api_key,
            ),
            ProviderKind::Anthropic => (
                &self.providers.anthropic.api_key_env,
                &self.providers.anthropic.api_key,
            ),
        };

        // Priority: env var > config file.
        non_empty(std::env::var(env_name).ok()).or_else(|| non_empty(stored.clone()))
    }

    /// Default model for a provider.
    pub fn default_model(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Google => &self.providers.google.default_model,
            ProviderKind::OpenAi => &self.providers.openai.default_model,
            ProviderKind::Anthropic => &self.providers.anthropic.default_model,
        }
    }

    /// Configured base URL override for a provider, if any.
    pub fn base_url(&self, kind: ProviderKind) -> Option<&str> {
        let url = match kind {
            ProviderKind::Google => self.providers.google.base_url.as_deref(),
            ProviderKind::OpenAi => self.providers.openai.base_url.as_deref(),
            ProviderKind::Anthropic => self.providers.anthropic.base_url.as_deref(),
        };
        url.map(str::trim).filter(|u| !u.is_empty())
    }

    /// Check if the given provider has an API key.
    pub fn is_provider_configured(&self, kind: ProviderKind) -> bool {
        self.api_key(kind).is_some()
    }

    /// Providers with an API key available.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_provider_configured(*kind))
            .collect()
    }

    /// Fail only when no provider can be used at all.
    pub fn validate(&self) -> Result<()> {
        if self.configured_providers().is_empty() {
            return Err(ChatError::Config(format!(
                "No API key found. Set at least one of {}, {} or {}, or add one to {}.",
                self.providers.google.api_key_env,
                self.providers.openai.api_key_env,
                self.providers.anthropic.api_key_env,
                Self::default_path().display()
            )));
        }
        Ok(())
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (env-shaped names).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_empty(lookup(name));

        if let Some(provider) = get("CHAT_PROVIDER") {
            match provider.parse::<ProviderKind>() {
                Ok(kind) => self.defaults.provider = kind,
                Err(_) => {
                    tracing::warn!(value = %provider, "ignoring unknown CHAT_PROVIDER");
                }
            }
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.providers.google.default_model = model;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.providers.openai.default_model = model;
        }
        if let Some(model) = get("ANTHROPIC_MODEL") {
            self.providers.anthropic.default_model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.providers.openai.base_url = Some(url);
        }
    }
}
