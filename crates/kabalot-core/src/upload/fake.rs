//! In-memory uploader.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Result, StorageUploader};
use crate::error::UploadError;

/// Returns predictable links, or fails every upload when built with [`FakeUploader::failing`].
#[derive(Debug, Default)]
pub struct FakeUploader {
    failure: Option<String>,
    uploads: Mutex<Vec<PathBuf>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Files uploaded so far.
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageUploader for FakeUploader {
    async fn upload(&self, local: &Path) -> Result<String> {
        if let Some(reason) = &self.failure {
            return Err(UploadError::Transport(reason.clone()));
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(local.to_path_buf());
        }
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("https://dropbox.test/s/{name}"))
    }
}
