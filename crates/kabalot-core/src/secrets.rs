//! Service credentials.
//!
//! Secrets are read from a private JSON file and may be overridden by environment variables.
//! [`Secret`] never prints its full value: `Debug` and `Display` show only the last four
//! characters.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable overriding the extraction API key.
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the storage token.
pub const DROPBOX_TOKEN_ENV: &str = "DROPBOX_TOKEN";

/// A credential that is redacted whenever it is formatted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Trailing fragment safe to echo for verification.
    pub fn masked(&self) -> String {
        let count = self.0.chars().count();
        if count <= 4 {
            return "****".to_string();
        }
        let tail: String = self.0.chars().skip(count - 4).collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.masked())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Credentials for the extraction and storage services.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub openai: Secret,
    pub dropbox: Secret,
}

#[derive(Deserialize, Default)]
struct SecretsFile {
    openai: Option<Secret>,
    dropbox: Option<Secret>,
}

impl Secrets {
    /// Load secrets from `path` (if it exists), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if path.exists() => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
            _ => SecretsFile::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    fn from_sources(
        file: SecretsFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |from_file: Option<Secret>, key: &str, name: &str| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .map(Secret::new)
                .or(from_file)
                .ok_or_else(|| ConfigError::MissingSecret(name.to_string()))
        };

        let secrets = Self {
            openai: pick(file.openai, OPENAI_KEY_ENV, "openai")?,
            dropbox: pick(file.dropbox, DROPBOX_TOKEN_ENV, "dropbox")?,
        };
        tracing::info!(
            openai = %secrets.openai,
            dropbox = %secrets.dropbox,
            "Loaded service credentials"
        );
        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_formatting_shows_only_tail() {
        let secret = Secret::new("sl.ABCDEFGHIJKLmnop");
        assert_eq!(secret.to_string(), "****mnop");
        assert_eq!(format!("{secret:?}"), "Secret(****mnop)");
        assert!(!format!("{secret:?}").contains("ABCDEF"));
    }

    #[test]
    fn test_short_secret_is_fully_masked() {
        assert_eq!(Secret::new("abc").masked(), "****");
    }

    #[test]
    fn test_environment_overrides_file() {
        let file: SecretsFile =
            serde_json::from_str(r#"{ "openai": "file-key-1234", "dropbox": "file-token-9999" }"#)
                .unwrap();
        let secrets = Secrets::from_sources(file, |key| {
            (key == OPENAI_KEY_ENV).then(|| "env-key-5678".to_string())
        })
        .unwrap();
        assert_eq!(secrets.openai.expose(), "env-key-5678");
        assert_eq!(secrets.dropbox.expose(), "file-token-9999");
    }

    #[test]
    fn test_missing_secret_is_named() {
        let err = Secrets::from_sources(SecretsFile::default(), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret(name) if name == "openai"));
    }
}
