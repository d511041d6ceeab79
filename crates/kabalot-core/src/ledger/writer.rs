//! Ledger output: CSV files or an xlsx workbook, replaced atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::NamedTempFile;

use super::{LEDGER_COLUMNS, Ledger, ROLLUP_COLUMNS};
use crate::error::LedgerError;

type Result<T> = std::result::Result<T, LedgerError>;

/// Output format, chosen by the ledger path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFormat {
    Csv,
    Xlsx,
}

impl LedgerFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => LedgerFormat::Xlsx,
            _ => LedgerFormat::Csv,
        }
    }
}

/// Sibling file holding the rollup in CSV mode: `<stem>_rollup.csv`.
pub fn rollup_path(ledger: &Path) -> PathBuf {
    let stem = ledger
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    ledger.with_file_name(format!("{stem}_rollup.csv"))
}

fn temp_beside(target: &Path) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn replace(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist(target).map_err(|e| LedgerError::Io(e.error))?;
    Ok(())
}

fn write_csv<const N: usize>(
    target: &Path,
    header: [&str; N],
    rows: impl Iterator<Item = [String; N]>,
) -> Result<()> {
    let mut temp = temp_beside(target)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file_mut());
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush()?;
    }
    temp.as_file_mut().flush()?;
    replace(temp, target)
}

/// Write the ledger and its rollup to `target`.
pub fn write_ledger(ledger: &Ledger, target: &Path) -> Result<()> {
    match LedgerFormat::for_path(target) {
        LedgerFormat::Csv => {
            write_csv(target, LEDGER_COLUMNS, ledger.rows.iter().map(|r| r.cells()))?;
            write_csv(
                &rollup_path(target),
                ROLLUP_COLUMNS,
                ledger.rollup.iter().map(|r| r.cells()),
            )
        }
        LedgerFormat::Xlsx => write_workbook(ledger, target),
    }
}

fn write_workbook(ledger: &Ledger, target: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let amount_format = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name("Ledger")?;
    for (col, name) in LEDGER_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }
    for (index, row) in ledger.rows.iter().enumerate() {
        let r = index as u32 + 1;
        for (col, cell) in row.cells().iter().enumerate() {
            if col == 1 {
                let amount = row.total_charge.to_f64().unwrap_or_default();
                sheet.write_number_with_format(r, col as u16, amount, &amount_format)?;
            } else {
                sheet.write_string(r, col as u16, cell.as_str())?;
            }
        }
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Rollup")?;
    for (col, name) in ROLLUP_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }
    for (index, row) in ledger.rollup.iter().enumerate() {
        let r = index as u32 + 1;
        sheet.write_string(r, 0, row.type_code.as_str())?;
        sheet.write_number_with_format(r, 1, row.total_charge.to_f64().unwrap_or_default(), &amount_format)?;
        sheet.write_number(r, 2, row.records as f64)?;
    }

    let temp = temp_beside(target)?;
    workbook.save(temp.path())?;
    replace(temp, target)
}
