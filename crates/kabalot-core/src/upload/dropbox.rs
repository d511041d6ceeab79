//! Dropbox HTTP API uploader.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{Result, StorageUploader};
use crate::error::UploadError;
use crate::secrets::Secret;

const CONTENT_URL: &str = "https://content.dropboxapi.com";
const API_URL: &str = "https://api.dropboxapi.com";

#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'static str,
    autorename: bool,
    mute: bool,
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    path_display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SharedLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SharedLinks {
    links: Vec<SharedLink>,
}

/// JSON for the `Dropbox-API-Arg` header, which must be pure ASCII.
fn header_json(value: &impl Serialize) -> Result<String> {
    let raw = serde_json::to_string(value).map_err(|e| UploadError::Transport(e.to_string()))?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}

async fn api_error(response: Response) -> UploadError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    UploadError::Api { status, body }
}

/// Uploads into a fixed Dropbox folder.
///
/// Files never replace each other: a same-named upload is renamed by Dropbox (`a (1).pdf`)
/// and the link points at the path Dropbox reports back.
pub struct DropboxUploader {
    client: Client,
    token: Secret,
    upload_path: String,
    content_url: String,
    api_url: String,
}

impl DropboxUploader {
    pub fn new(upload_path: &str, token: Secret) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let folder = upload_path.trim().trim_end_matches('/');
        let upload_path = if folder.starts_with('/') {
            folder.to_string()
        } else {
            format!("/{folder}")
        };

        Ok(Self {
            client,
            token,
            upload_path,
            content_url: CONTENT_URL.to_string(),
            api_url: API_URL.to_string(),
        })
    }

    /// Point at other API hosts (used against local mock servers).
    pub fn with_base_urls(mut self, content_url: &str, api_url: &str) -> Self {
        self.content_url = content_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Remote path for a local file.
    pub fn remote_path(&self, local: &Path) -> String {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.upload_path == "/" {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.upload_path)
        }
    }

    async fn send_file(&self, remote: &str, bytes: Vec<u8>) -> Result<String> {
        let arg = header_json(&UploadArg {
            path: remote,
            mode: "add",
            autorename: true,
            mute: true,
        })?;

        let response = self
            .client
            .post(format!("{}/2/files/upload", self.content_url))
            .bearer_auth(self.token.expose())
            .header("Dropbox-API-Arg", arg)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let metadata: FileMetadata = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(metadata.path_display.unwrap_or_else(|| remote.to_string()))
    }

    async fn share(&self, remote: &str) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/2/sharing/create_shared_link_with_settings",
                self.api_url
            ))
            .bearer_auth(self.token.expose())
            .json(&json!({ "path": remote }))
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let link: SharedLink = response
                .json()
                .await
                .map_err(|_| UploadError::MissingLink)?;
            return Ok(link.url);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 409 && body.contains("shared_link_already_exists") {
            debug!(path = remote, "Shared link exists, listing it");
            return self.existing_link(remote).await;
        }
        Err(UploadError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn existing_link(&self, remote: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/2/sharing/list_shared_links", self.api_url))
            .bearer_auth(self.token.expose())
            .json(&json!({ "path": remote, "direct_only": true }))
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let links: SharedLinks = response
            .json()
            .await
            .map_err(|_| UploadError::MissingLink)?;
        links
            .links
            .into_iter()
            .next()
            .map(|l| l.url)
            .ok_or(UploadError::MissingLink)
    }
}

#[async_trait]
impl StorageUploader for DropboxUploader {
    async fn upload(&self, local: &Path) -> Result<String> {
        let bytes = tokio::fs::read(local).await?;
        let remote = self.remote_path(local);

        let stored = self.send_file(&remote, bytes).await?;
        let link = self.share(&stored).await?;

        info!(file = %local.display(), remote = %stored, "Uploaded original document");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn uploader(server: &MockServer, folder: &str) -> DropboxUploader {
        DropboxUploader::new(folder, Secret::new("sl.token-1234"))
            .unwrap()
            .with_base_urls(&server.base_url(), &server.base_url())
    }

    fn local_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();
        path
    }

    #[test]
    fn test_header_json_is_ascii() {
        let arg = header_json(&json!({"path": "/חשבוניות/a.pdf"})).unwrap();
        assert!(arg.is_ascii());
        assert!(arg.contains("\\u05d7"));
        let back: serde_json::Value = serde_json::from_str(&arg).unwrap();
        assert_eq!(back["path"], "/חשבוניות/a.pdf");
    }

    #[test]
    fn test_remote_path() {
        let folder = |path: &str| DropboxUploader::new(path, Secret::new("t")).unwrap();
        assert_eq!(
            folder("Invoices/2024/").remote_path(Path::new("in/a.pdf")),
            "/Invoices/2024/a.pdf"
        );
        assert_eq!(folder("/").remote_path(Path::new("a.pdf")), "/a.pdf");
    }

    #[tokio::test]
    async fn test_upload_and_create_link() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2/files/upload")
                    .header("authorization", "Bearer sl.token-1234")
                    .header_exists("dropbox-api-arg");
                then.status(200)
                    .json_body(serde_json::json!({"path_display": "/Invoices/a.pdf"}));
            })
            .await;
        let share = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2/sharing/create_shared_link_with_settings")
                    .json_body(serde_json::json!({"path": "/Invoices/a.pdf"}));
                then.status(200)
                    .json_body(serde_json::json!({"url": "https://www.dropbox.com/s/abc/a.pdf?dl=0"}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let link = uploader(&server, "/Invoices")
            .upload(&local_file(&dir, "a.pdf"))
            .await
            .unwrap();

        upload.assert_async().await;
        share.assert_async().await;
        assert_eq!(link, "https://www.dropbox.com/s/abc/a.pdf?dl=0");
    }

    #[tokio::test]
    async fn test_same_name_is_renamed_not_replaced() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST).path("/2/files/upload").header(
                    "dropbox-api-arg",
                    r#"{"path":"/Invoices/a.pdf","mode":"add","autorename":true,"mute":true}"#,
                );
                then.status(200)
                    .json_body(serde_json::json!({"path_display": "/Invoices/a (1).pdf"}));
            })
            .await;
        let share = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2/sharing/create_shared_link_with_settings")
                    .json_body(serde_json::json!({"path": "/Invoices/a (1).pdf"}));
                then.status(200)
                    .json_body(serde_json::json!({"url": "https://www.dropbox.com/s/def/a%20(1).pdf?dl=0"}));
            })
            .await;

        // Same file name from a second input folder
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("march")).unwrap();
        let link = uploader(&server, "/Invoices")
            .upload(&local_file(&dir, "march/a.pdf"))
            .await
            .unwrap();

        upload.assert_async().await;
        share.assert_async().await;
        assert_eq!(link, "https://www.dropbox.com/s/def/a%20(1).pdf?dl=0");
    }

    #[tokio::test]
    async fn test_existing_link_is_reused() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/2/files/upload");
                then.status(200)
                    .json_body(serde_json::json!({"path_display": "/Invoices/a.pdf"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2/sharing/create_shared_link_with_settings");
                then.status(409).json_body(serde_json::json!({
                    "error_summary": "shared_link_already_exists/..",
                    "error": {".tag": "shared_link_already_exists"}
                }));
            })
            .await;
        let list = server
            .mock_async(|when, then| {
                when.method(POST).path("/2/sharing/list_shared_links");
                then.status(200).json_body(serde_json::json!({
                    "links": [{"url": "https://www.dropbox.com/s/old/a.pdf?dl=0"}]
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let link = uploader(&server, "/Invoices")
            .upload(&local_file(&dir, "a.pdf"))
            .await
            .unwrap();

        list.assert_async().await;
        assert_eq!(link, "https://www.dropbox.com/s/old/a.pdf?dl=0");
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/2/files/upload");
                then.status(401).body("invalid_access_token");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let err = uploader(&server, "/Invoices")
            .upload(&local_file(&dir, "a.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let server = MockServer::start_async().await;
        let err = uploader(&server, "/Invoices")
            .upload(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
