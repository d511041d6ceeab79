//! Ledger aggregation: one row per stored record plus a per-category rollup.
//!
//! The ledger is always regenerated from the full set of stored records, keyed by storage
//! id, so a rerun yields the same output and never duplicates a row.

mod lock;
mod writer;

pub use lock::LedgerLock;
pub use writer::{LedgerFormat, rollup_path, write_ledger};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::invoice::rules::amount_from_value;
use crate::models::invoice::{ExpenseType, SUMMARY_KEY};
use crate::store::{RecordStore, StorageId};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger columns, in output order.
pub const LEDGER_COLUMNS: [&str; 8] = [
    "type_code",
    "total_charge",
    "company_id",
    "invoice_number",
    "date_of_invoice",
    "input_file",
    "dropbox_link",
    "expense_type",
];

/// Rollup columns, in output order.
pub const ROLLUP_COLUMNS: [&str; 3] = ["type_code", "total_charge", "records"];

/// Flattened summary of one stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub storage_id: StorageId,
    pub type_code: String,
    pub total_charge: Decimal,
    pub company_id: Option<String>,
    pub invoice_number: Option<String>,
    pub date_of_invoice: Option<String>,
    pub input_file: Option<String>,
    pub dropbox_link: Option<String>,
    pub expense_type: String,
}

impl LedgerRow {
    /// Cell values in [`LEDGER_COLUMNS`] order.
    pub fn cells(&self) -> [String; 8] {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            self.type_code.clone(),
            format!("{:.2}", self.total_charge),
            text(&self.company_id),
            text(&self.invoice_number),
            text(&self.date_of_invoice),
            text(&self.input_file),
            text(&self.dropbox_link),
            self.expense_type.clone(),
        ]
    }
}

/// Total per expense category.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupRow {
    pub type_code: String,
    pub total_charge: Decimal,
    pub records: usize,
}

impl RollupRow {
    pub fn cells(&self) -> [String; 3] {
        [
            self.type_code.clone(),
            format!("{:.2}", self.total_charge),
            self.records.to_string(),
        ]
    }
}

/// A full rebuild of the ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    /// Rows sorted by storage id.
    pub rows: Vec<LedgerRow>,
    /// Rows sorted by type code.
    pub rollup: Vec<RollupRow>,
    /// Stored files that could not be projected.
    pub skipped: usize,
}

fn scalar_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Project a stored record into a ledger row.
///
/// Reads the first page carrying a summary object and coerces its fields leniently, so
/// hand-edited records with string amounts still aggregate.
pub fn project(storage_id: &str, record: &Value) -> Option<LedgerRow> {
    let summary = record
        .as_array()?
        .iter()
        .find_map(|page| page.get(SUMMARY_KEY)?.as_object())?;

    let total_charge = summary.get("total_charge").and_then(amount_from_value)?;
    let type_code = scalar_text(summary, "type_code").unwrap_or_else(|| "?".to_string());
    let expense_type = scalar_text(summary, "expense_type").unwrap_or_else(|| {
        ExpenseType::parse(&type_code)
            .unwrap_or_default()
            .label()
            .to_string()
    });

    Some(LedgerRow {
        storage_id: storage_id.to_string(),
        type_code,
        total_charge,
        company_id: scalar_text(summary, "company_id"),
        invoice_number: scalar_text(summary, "invoice_number"),
        date_of_invoice: scalar_text(summary, "date_of_invoice"),
        input_file: scalar_text(summary, "input_file"),
        dropbox_link: scalar_text(summary, "dropbox_link"),
        expense_type,
    })
}

/// Sum rows per type code.
pub fn rollup(rows: &[LedgerRow]) -> Result<Vec<RollupRow>> {
    let mut groups: BTreeMap<&str, (Decimal, usize)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.type_code.as_str()).or_default();
        entry.0 = entry
            .0
            .checked_add(row.total_charge)
            .ok_or_else(|| LedgerError::AmountOverflow {
                type_code: row.type_code.clone(),
            })?;
        entry.1 += 1;
    }
    Ok(groups
        .into_iter()
        .map(|(type_code, (total_charge, records))| RollupRow {
            type_code: type_code.to_string(),
            total_charge,
            records,
        })
        .collect())
}

/// Rebuilds the ledger from every record in the store.
pub struct SummaryAggregator {
    store: RecordStore,
    ledger_path: PathBuf,
}

impl SummaryAggregator {
    pub fn new(store: RecordStore, ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            ledger_path: ledger_path.into(),
        }
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Read and project every stored record.
    pub fn rebuild(&self) -> Result<Ledger> {
        let mut ledger = Ledger::default();

        for id in self.store.list()? {
            let path = self.store.path_for(&id);
            let record: Value = match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
            {
                Ok(value) => value,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unreadable record");
                    ledger.skipped += 1;
                    continue;
                }
            };

            match project(&id, &record) {
                Some(row) => ledger.rows.push(row),
                None => {
                    warn!(file = %path.display(), "Skipping record without a usable summary");
                    ledger.skipped += 1;
                }
            }
        }

        ledger.rows.sort_by(|a, b| a.storage_id.cmp(&b.storage_id));
        ledger.rollup = rollup(&ledger.rows)?;
        Ok(ledger)
    }

    /// Replace the ledger output with `ledger`.
    pub fn write(&self, ledger: &Ledger) -> Result<()> {
        write_ledger(ledger, &self.ledger_path)
    }

    /// Rebuild and write under the ledger lock.
    pub fn aggregate(&self) -> Result<Ledger> {
        let _lock = LedgerLock::acquire(&self.ledger_path)?;
        let ledger = self.rebuild()?;
        self.write(&ledger)?;
        info!(
            ledger = %self.ledger_path.display(),
            rows = ledger.rows.len(),
            skipped = ledger.skipped,
            "Ledger rebuilt"
        );
        Ok(ledger)
    }
}
