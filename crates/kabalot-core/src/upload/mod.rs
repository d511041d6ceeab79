//! Uploading original documents to cloud storage for a shareable link.

mod dropbox;
mod fake;

pub use dropbox::DropboxUploader;
pub use fake::FakeUploader;

use std::path::Path;

use async_trait::async_trait;

use crate::error::UploadError;

pub type Result<T> = std::result::Result<T, UploadError>;

/// A remote store for original documents.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    /// Upload a local file and return a shareable link to it.
    async fn upload(&self, local: &Path) -> Result<String>;
}
