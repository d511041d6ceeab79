//! Durable, collision-safe storage of normalized invoice records.
//!
//! One pretty-printed JSON file per invoice, named after its sanitized invoice number.
//! Writes go through a temporary file in the output directory and are linked into place
//! without replacing anything already there.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::config::StoreConfig;
use crate::models::invoice::InvoiceRecord;

pub type Result<T> = std::result::Result<T, StoreError>;

/// File stem of a stored record, unique within the output directory.
pub type StorageId = String;

const MAX_ID_CHARS: usize = 120;
const RECORD_EXTENSION: &str = "json";

/// Make an invoice number safe to use as a file name.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_id(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed: String = out
        .trim_matches(|c| c == '.' || c == '_')
        .chars()
        .take(MAX_ID_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches(['.', '_']);

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn timestamp_id() -> String {
    format!("invoice_{}", Utc::now().format("%Y%m%dT%H%M%S%3f"))
}

/// Record store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    output_dir: PathBuf,
    config: StoreConfig,
}

impl RecordStore {
    pub fn new(output_dir: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Serialize a record the way it is stored: UTF-8, 4-space indent, non-ASCII unescaped.
    pub fn to_bytes(record: &InvoiceRecord) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        record.serialize(&mut serializer)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Write a record under a fresh identifier and return it.
    ///
    /// Existing records are never replaced: `<id>`, `<id>_1`, `<id>_2`, ... are tried in
    /// order up to the configured suffix limit.
    pub fn persist(&self, record: &InvoiceRecord) -> Result<StorageId> {
        let base = record
            .summary()
            .and_then(|s| s.invoice_number.as_deref())
            .and_then(sanitize_id)
            .unwrap_or_else(timestamp_id);

        fs::create_dir_all(&self.output_dir)?;
        let bytes = Self::to_bytes(record)?;

        let mut temp = NamedTempFile::new_in(&self.output_dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        for suffix in 0..=self.config.max_suffix {
            let id = if suffix == 0 {
                base.clone()
            } else {
                format!("{base}_{suffix}")
            };
            let path = self.path_for(&id);
            if path.exists() {
                continue;
            }

            match temp.persist_noclobber(&path) {
                Ok(_) => {
                    info!(id = %id, path = %path.display(), "Stored invoice record");
                    return Ok(id);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(id = %id, "Identifier taken concurrently, trying next suffix");
                    temp = e.file;
                }
                Err(e) => return Err(StoreError::Io(e.error)),
            }
        }

        Err(StoreError::Exhausted {
            base,
            attempts: self.config.max_suffix.saturating_add(1),
        })
    }

    /// Read a stored record back.
    pub fn load(&self, id: &str) -> Result<InvoiceRecord> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Identifiers of every stored record, sorted.
    pub fn list(&self) -> Result<Vec<StorageId>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{InvoiceSummary, PageResult};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tempfile::TempDir;
    use std::str::FromStr;

    fn record(invoice_number: Option<&str>) -> InvoiceRecord {
        let mut page = PageResult::with_fields(
            json!({"ספק": "חניון עזריאלי"}).as_object().cloned().unwrap(),
        );
        page.summary = Some(InvoiceSummary {
            total_charge: Decimal::from(18),
            invoice_number: invoice_number.map(String::from),
            ..Default::default()
        });
        InvoiceRecord { pages: vec![page] }
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("1001"), Some("1001".to_string()));
        assert_eq!(sanitize_id("INV/2024/07"), Some("INV_2024_07".to_string()));
        assert_eq!(sanitize_id(" a: b?? "), Some("a_b".to_string()));
        assert_eq!(sanitize_id("..hidden.."), Some("hidden".to_string()));
        assert_eq!(sanitize_id("חשבונית 12"), Some("חשבונית_12".to_string()));
        assert_eq!(sanitize_id("///"), None);
        assert_eq!(sanitize_id(""), None);
        assert_eq!(sanitize_id(&"9".repeat(300)).map(|s| s.len()), Some(120));
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig::default());

        assert_eq!(store.persist(&record(Some("1001"))).unwrap(), "1001");
        assert_eq!(store.persist(&record(Some("1001"))).unwrap(), "1001_1");
        assert_eq!(store.persist(&record(Some("1001"))).unwrap(), "1001_2");
        assert_eq!(store.list().unwrap(), vec!["1001", "1001_1", "1001_2"]);
    }

    #[test]
    fn test_missing_number_uses_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig::default());

        let id = store.persist(&record(None)).unwrap();
        assert!(id.starts_with("invoice_"), "unexpected id {id}");
        assert!(store.path_for(&id).exists());
    }

    #[test]
    fn test_exhausted_suffixes() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig { max_suffix: 1 });

        store.persist(&record(Some("7"))).unwrap();
        store.persist(&record(Some("7"))).unwrap();
        let err = store.persist(&record(Some("7"))).unwrap_err();

        assert!(matches!(err, StoreError::Exhausted { attempts: 2, .. }));
        // No temporary files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_stored_format_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig::default());
        let mut original = record(Some("A-1"));
        let amount = Decimal::from_str("12345678901234567.89").unwrap();
        if let Some(summary) = original.summary_mut() {
            summary.total_charge = amount;
            summary.vat_amount = Some(Decimal::from_str("0.10").unwrap());
        }

        let id = store.persist(&original).unwrap();
        let content = fs::read_to_string(store.path_for(&id)).unwrap();

        assert!(content.contains("חניון עזריאלי"));
        assert!(content.contains("\n        \"invoice_summary\""));
        assert!(content.contains("\"total_charge\": 12345678901234567.89"));
        assert!(content.contains("\"vat_amount\": 0.10"));
        assert_eq!(store.load(&id).unwrap(), original);

        let stored: serde_json::Value = serde_json::from_str(&content).unwrap();
        let row = crate::ledger::project(&id, &stored).unwrap();
        assert_eq!(row.total_charge, amount);
        assert_eq!(row.invoice_number.as_deref(), Some("A-1"));
    }

    #[test]
    fn test_load_missing_record() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig::default());
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        fs::write(dir.path().join("a.json"), "[]").unwrap();
        fs::write(dir.path().join("ledger.csv"), "").unwrap();
        let store = RecordStore::new(dir.path(), StoreConfig::default());

        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }
}
