// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating chat providers
//!
//! Centralizes provider creation from resolved settings. The orchestrator
//! only sees the [`ProviderSource`] trait so tests can substitute a mock.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{ChatError, Result};
use crate::llm::provider::{ChatProvider, ProviderKind};
use crate::llm::providers::{AnthropicProvider, GoogleProvider, OpenAiProvider};

/// Anything that can hand out a ready-to-use provider
pub trait ProviderSource: Send + Sync {
    /// Build (or look up) the provider for `kind`. `base_url_override`
    /// replaces the configured API root for this call only.
    fn provider(
        &self,
        kind: ProviderKind,
        base_url_override: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>>;
}

/// Factory for creating providers from settings
pub struct ProviderFactory {
    settings: Arc<Settings>,
}

impl ProviderFactory {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Create a provider based on kind and settings
    ///
    /// # Arguments
    /// * `kind` - Which provider family to build
    /// * `settings` - Application settings containing provider configuration
    /// * `base_url_override` - Per-call API root (takes precedence over settings)
    pub fn create(
        kind: ProviderKind,
        settings: &Settings,
        base_url_override: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let base_url = base_url_override
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or_else(|| settings.base_url(kind));

        tracing::debug!(
            provider = %kind,
            custom_base_url = base_url.is_some(),
            "creating provider"
        );

        match kind {
            ProviderKind::Google => Self::create_google(settings, base_url),
            ProviderKind::OpenAi => Self::create_openai(settings, base_url),
            ProviderKind::Anthropic => Self::create_anthropic(settings, base_url),
        }
    }

    /// Create a Google provider
    pub fn create_google(
        settings: &Settings,
        base_url: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let api_key = Self::require_key(settings, ProviderKind::Google)?;
        let provider = match base_url {
            Some(url) => GoogleProvider::with_base_url(api_key, url),
            None => GoogleProvider::new(api_key),
        };
        Ok(Arc::new(provider))
    }

    /// Create an OpenAI (or compatible) provider
    pub fn create_openai(
        settings: &Settings,
        base_url: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let api_key = Self::require_key(settings, ProviderKind::OpenAi)?;
        let provider = match base_url {
            Some(url) => OpenAiProvider::with_base_url(api_key, url),
            None => OpenAiProvider::new(api_key),
        };
        Ok(Arc::new(provider))
    }

    /// Create an Anthropic provider
    pub fn create_anthropic(
        settings: &Settings,
        base_url: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let api_key = Self::require_key(settings, ProviderKind::Anthropic)?;
        let provider = match base_url {
            Some(url) => AnthropicProvider::with_base_url(api_key, url),
            None => AnthropicProvider::new(api_key),
        };
        Ok(Arc::new(provider))
    }

    fn require_key(settings: &Settings, kind: ProviderKind) -> Result<String> {
        settings.api_key(kind).ok_or_else(|| {
            let env_name = match kind {
                ProviderKind::Google => &settings.providers.google.api_key_env,
                ProviderKind::OpenAi => &settings.providers.openai.api_key_env,
                ProviderKind::Anthropic => &settings.providers.anthropic.api_key_env,
            };
            ChatError::Config(format!(
                "No {} API key found. Set {} env var or add it to {}.",
                kind,
                env_name,
                Settings::default_path().display()
            ))
        })
    }
}

impl ProviderSource for ProviderFactory {
    fn provider(
        &self,
        kind: ProviderKind,
        base_url_override: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        Self::create(kind, &self.settings, base_url_override)
    }
}
