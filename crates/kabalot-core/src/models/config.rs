//! Configuration structures for the invoice pipeline.
//!
//! The on-disk [`ConfigFile`] is lenient: every option may be absent so that `config init`
//! can write a skeleton and `config show` can print a partial file. [`ConfigFile::resolve`]
//! turns it into a [`KabalotConfig`], failing with every missing required option at once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration file as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Directories scanned for invoice files.
    pub input_dirs: Vec<PathBuf>,

    /// Directory receiving one JSON record per invoice.
    pub output_dir: Option<PathBuf>,

    /// Remote folder the original files are uploaded to.
    pub upload_path: Option<String>,

    /// Ledger file (`.xlsx` or `.csv`).
    pub ledger_path: Option<PathBuf>,

    /// Secrets file holding the service credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_path: Option<PathBuf>,

    pub extraction: ExtractionConfig,
    pub raster: RasterConfig,
    pub normalization: NormalizationConfig,
    pub exchange: ExchangeConfig,
    pub store: StoreConfig,
    pub batch: BatchConfig,
}

/// Validated configuration passed into every pipeline component.
#[derive(Debug, Clone)]
pub struct KabalotConfig {
    pub input_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub upload_path: String,
    pub ledger_path: PathBuf,
    pub secrets_path: Option<PathBuf>,
    pub extraction: ExtractionConfig,
    pub raster: RasterConfig,
    pub normalization: NormalizationConfig,
    pub exchange: ExchangeConfig,
    pub store: StoreConfig,
    pub batch: BatchConfig,
}

/// Extraction service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of the OpenAI-compatible API.
    pub endpoint: String,

    /// Vision-capable model name.
    pub model: String,

    /// Upper bound on in-flight extraction requests across the whole batch.
    pub max_concurrent_requests: usize,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_concurrent_requests: 4,
            timeout_secs: 120,
        }
    }
}

/// Page rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// `pdftoppm` executable used for rendering.
    pub pdftoppm: PathBuf,

    /// Parent directory for scratch page images (system temp dir when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            render_dpi: 150,
            pdftoppm: PathBuf::from("pdftoppm"),
            scratch_dir: None,
        }
    }
}

/// Invoice normalization rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// ISO code of the bookkeeping currency.
    pub local_currency: String,

    /// Registration plates of the company's vehicles.
    pub vehicle_plates: Vec<String>,

    /// Accepted difference between a stated total and the item sum.
    pub amount_tolerance: Decimal,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            local_currency: "ILS".to_string(),
            vehicle_plates: Vec::new(),
            amount_tolerance: Decimal::new(5, 2),
        }
    }
}

/// Where exchange rates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeProvider {
    /// Static table from [`ExchangeConfig::rates`].
    #[default]
    Fixed,
    /// Frankfurter historical rates API.
    Frankfurter,
}

/// Exchange rate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub provider: ExchangeProvider,

    /// Rates to the local currency, keyed by ISO code (fixed provider).
    pub rates: BTreeMap<String, Decimal>,

    /// Base URL of the rates API (frankfurter provider).
    pub endpoint: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            provider: ExchangeProvider::Fixed,
            rates: BTreeMap::new(),
            endpoint: "https://api.frankfurter.app".to_string(),
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Highest numeric suffix tried before giving up on a colliding identifier.
    pub max_suffix: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_suffix: 9999 }
    }
}

/// Batch driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of files processed concurrently.
    pub file_jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { file_jobs: 2 }
    }
}

impl ConfigFile {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Names of required options that are absent.
    pub fn missing_options(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.input_dirs.is_empty() {
            missing.push("input_dirs".to_string());
        }
        if self.output_dir.is_none() {
            missing.push("output_dir".to_string());
        }
        if self.upload_path.as_deref().is_none_or(|p| p.trim().is_empty()) {
            missing.push("upload_path".to_string());
        }
        if self.ledger_path.is_none() {
            missing.push("ledger_path".to_string());
        }
        missing
    }

    /// Validate and convert into the runtime configuration.
    pub fn resolve(self) -> Result<KabalotConfig, ConfigError> {
        let missing = self.missing_options();
        let required = (
            self.output_dir.clone(),
            self.upload_path.clone().filter(|p| !p.trim().is_empty()),
            self.ledger_path.clone(),
        );
        let (Some(output_dir), Some(upload_path), Some(ledger_path)) = required else {
            return Err(ConfigError::MissingOptions(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigError::MissingOptions(missing));
        }

        if self.extraction.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                option: "extraction.max_concurrent_requests".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batch.file_jobs == 0 {
            return Err(ConfigError::Invalid {
                option: "batch.file_jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.raster.render_dpi == 0 {
            return Err(ConfigError::Invalid {
                option: "raster.render_dpi".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(KabalotConfig {
            input_dirs: self.input_dirs,
            output_dir,
            upload_path,
            ledger_path,
            secrets_path: self.secrets_path,
            extraction: self.extraction,
            raster: self.raster,
            normalization: self.normalization,
            exchange: self.exchange,
            store: self.store,
            batch: self.batch,
        })
    }
}

impl KabalotConfig {
    /// Load and validate configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        ConfigFile::from_file(path)?.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_options_are_all_reported() {
        let err = ConfigFile::default().resolve().unwrap_err();
        match err {
            ConfigError::MissingOptions(missing) => assert_eq!(
                missing,
                vec!["input_dirs", "output_dir", "upload_path", "ledger_path"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_config_reports_only_absent_options() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "input_dirs": ["./in"], "output_dir": "./out", "upload_path": "  " }"#,
        )
        .unwrap();
        assert_eq!(file.missing_options(), vec!["upload_path", "ledger_path"]);
    }

    #[test]
    fn test_resolve_applies_section_defaults() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "input_dirs": ["./in"],
                "output_dir": "./out",
                "upload_path": "/invoices",
                "ledger_path": "./ledger.xlsx",
                "normalization": { "vehicle_plates": ["91-600-11"] },
                "exchange": { "rates": { "USD": "3.71", "EUR": 4.02 } }
            }"#,
        )
        .unwrap();

        let config = file.resolve().unwrap();
        assert_eq!(config.normalization.local_currency, "ILS");
        assert_eq!(config.normalization.vehicle_plates, vec!["91-600-11"]);
        assert_eq!(config.extraction.model, "gpt-4o");
        assert_eq!(config.raster.render_dpi, 150);
        assert_eq!(config.exchange.rates["USD"], Decimal::new(371, 2));
        assert_eq!(config.exchange.rates["EUR"], Decimal::new(402, 2));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut file = ConfigFile {
            input_dirs: vec![PathBuf::from("in")],
            output_dir: Some(PathBuf::from("out")),
            upload_path: Some("/x".into()),
            ledger_path: Some(PathBuf::from("ledger.csv")),
            ..Default::default()
        };
        file.batch.file_jobs = 0;
        assert!(matches!(file.resolve(), Err(ConfigError::Invalid { .. })));
    }
}
