// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Temporary staging of user attachments
//!
//! A file is written under the uploads directory with a random name, handed
//! to the provider's upload call, and removed again whatever the outcome.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{ChatError, Result};

/// A file attached to a chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Name as supplied by the user
    pub file_name: String,
    /// Raw contents
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a local file, keeping only its final path component as the name
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChatError::Upload(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { file_name, bytes })
    }

    /// True when there is nothing to attach
    pub fn is_empty(&self) -> bool {
        self.file_name.trim().is_empty()
    }

    /// MIME type guessed from the file name
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    /// Extension (with leading dot) safe to reuse in a staged file name
    fn safe_extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e))
            .unwrap_or_default()
    }
}

/// A staged copy of an upload, deleted on drop
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    removed: bool,
}

impl StagedUpload {
    /// Write `file` to `<dir>/<uuid><ext>`
    pub async fn stage(dir: &Path, file: &FileUpload) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ChatError::Upload(e.to_string()))?;

        let path = dir.join(format!("{}{}", Uuid::new_v4(), file.safe_extension()));
        let staged = Self {
            path,
            removed: false,
        };
        // Guard is live before the write so a partial file is still removed
        tokio::fs::write(&staged.path, &file.bytes)
            .await
            .map_err(|e| ChatError::Upload(e.to_string()))?;

        tracing::debug!(path = %staged.path.display(), bytes = file.bytes.len(), "staged upload");
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file now. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log_cleanup_failure(&self.path, &e);
        }
        self.removed = true;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log_cleanup_failure(&self.path, &e);
        }
    }
}

fn log_cleanup_failure(path: &Path, err: &std::io::Error) {
    if err.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!(path = %path.display(), error = %err, "failed to remove staged upload");
    }
}
