//! Error types for the kabalot-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the kabalot library.
#[derive(Error, Debug)]
pub enum KabalotError {
    /// The input file type is not a supported document or image.
    #[error("unsupported format for {}: {extension:?}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Document could not be turned into page images.
    #[error("rasterization error: {0}")]
    Rasterization(#[from] RasterError),

    /// External extraction capability failed or returned garbage.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Raw extraction output could not be normalized.
    #[error("normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    /// Record could not be written to the output directory.
    #[error("storage write error: {0}")]
    StorageWrite(#[from] StoreError),

    /// Original file could not be uploaded to cloud storage.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Ledger rebuild failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl KabalotError {
    /// Whether this error must stop the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KabalotError::Config(_))
    }
}

/// Errors related to turning documents into page images.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// A page produced no image through either rendering path.
    #[error("no image could be produced for page {page}")]
    NoImage { page: u32 },

    /// The external page renderer failed.
    #[error("page renderer failed: {0}")]
    Renderer(String),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while reading the document or scratch files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the document-understanding capability.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response carried no message content.
    #[error("empty response from extraction service")]
    Empty,

    /// The response content is not structured data.
    #[error("response is not valid JSON: {reason}")]
    Unparseable { reason: String },

    /// The page image could not be encoded for transport.
    #[error("failed to encode page {page}: {reason}")]
    Encode { page: usize, reason: String },
}

/// Errors raised while normalizing raw page results.
#[derive(Error, Debug)]
pub enum NormalizationError {
    /// A page result was not a key/value mapping.
    #[error("page {page} is not a JSON object (found {found})")]
    NotAnObject { page: usize, found: &'static str },

    /// Exchange rate lookup failed hard (not merely unavailable).
    #[error("exchange rate lookup failed: {0}")]
    ExchangeRate(String),

    /// Adding up the invoice's amounts left the representable range.
    #[error("amount overflow while computing the {0}")]
    AmountOverflow(&'static str),
}

/// Errors raised by the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Every candidate suffix is already taken.
    #[error("no free identifier for {base:?} after {attempts} attempts")]
    Exhausted { base: String, attempts: u32 },

    /// Record serialization failed.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored record could not be found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the cloud storage collaborator.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response did not contain a link.
    #[error("no shared link in response")]
    MissingLink,

    /// Local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while rebuilding the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Another aggregation pass holds the ledger lock.
    #[error("ledger is locked by another run: {}", .0.display())]
    Busy(PathBuf),

    /// Stored records could not be listed.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    /// A category total left the representable range.
    #[error("amount overflow while totalling {type_code:?}")]
    AmountOverflow { type_code: String },

    /// CSV output failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook output failed.
    #[error("workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration and secrets.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required options are absent.
    #[error("missing required options: {}", .0.join(", "))]
    MissingOptions(Vec<String>),

    /// An option has an unusable value.
    #[error("invalid value for {option}: {reason}")]
    Invalid { option: String, reason: String },

    /// The config or secrets file could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A credential is missing from both the secrets file and the environment.
    #[error("missing secret: {0}")]
    MissingSecret(String),

    /// I/O error.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for the kabalot library.
pub type Result<T> = std::result::Result<T, KabalotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        let config = KabalotError::Config(ConfigError::MissingOptions(vec!["output_dir".into()]));
        assert!(config.is_fatal());

        let unsupported = KabalotError::UnsupportedFormat {
            path: PathBuf::from("in/notes.txt"),
            extension: "txt".into(),
        };
        assert!(!unsupported.is_fatal());
        assert!(!KabalotError::Extraction(ExtractionError::Empty).is_fatal());
    }

    #[test]
    fn test_missing_options_message_lists_every_option() {
        let err = ConfigError::MissingOptions(vec!["input_dirs".into(), "ledger_path".into()]);
        assert_eq!(err.to_string(), "missing required options: input_dirs, ledger_path");
    }
}
