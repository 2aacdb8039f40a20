// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::migration;
use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::home().join("config.toml")
    }

    /// Load settings from the default path and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::default_path())?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a specific path.
    ///
    /// A missing file yields defaults. A file that is not TOML is logged and
    /// also yields defaults. Invalid individual values are dropped one by
    /// one so the rest of the file still applies.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match Self::parse(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable settings file"
                );
                Ok(Self::default())
            }
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let raw: toml::Value = toml::from_str(content)?;
        let raw_value = serde_json::to_value(raw)?;
        let migrated = migration::migrate_on_load(raw_value);
        match serde_json::from_value(migrated.clone()) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(error = %e, "invalid settings values, keeping the valid ones");
                Ok(Self::salvage(migrated))
            }
        }
    }

    /// Apply the leaves of `value` to the defaults one at a time, skipping
    /// any leaf that would make the whole document fail to decode.
    fn salvage(value: serde_json::Value) -> Self {
        let mut accepted = serde_json::to_value(Self::default()).unwrap_or_default();
        for (path, leaf) in migration::leaves(value) {
            let mut candidate = accepted.clone();
            migration::set_path(&mut candidate, &path, leaf);
            if serde_json::from_value::<Self>(candidate.clone()).is_ok() {
                accepted = candidate;
            } else {
                tracing::warn!(key = %path.join("."), "ignoring invalid setting");
            }
        }
        serde_json::from_value(accepted).unwrap_or_default()
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path, merging with existing file content
    /// to preserve unknown keys from other versions or hand edits.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let new_value = serde_json::to_value(self)?;

        let merged = if path.exists() {
            let existing_content = std::fs::read_to_string(path)?;
            match toml::from_str::<toml::Value>(&existing_content) {
                Ok(existing) => migration::deep_merge(serde_json::to_value(existing)?, new_value),
                Err(_) => new_value, // Corrupt file, overwrite entirely.
            }
        } else {
            new_value
        };

        let content = toml::to_string_pretty(&merged)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the chatdeck home directory (~/.chatdeck or $CHATDECK_HOME).
    pub fn home() -> PathBuf {
        if let Ok(home) = std::env::var("CHATDECK_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatdeck")
    }

    /// Flat-file session snapshot.
    pub fn sessions_path() -> PathBuf {
        Self::home().join("sessions.json")
    }

    /// Staging directory for files awaiting upload.
    pub fn uploads_dir() -> PathBuf {
        Self::home().join("uploads")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories() -> Result<()> {
        for dir in [Self::home(), Self::uploads_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
