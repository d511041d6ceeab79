//! Ledger command - rebuild the ledger without processing new files.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;

use kabalot_core::error::LedgerError;
use kabalot_core::ledger::LedgerLock;
use kabalot_core::{RecordStore, SummaryAggregator};

use super::load_config;

/// Arguments for the ledger command.
#[derive(Args)]
pub struct LedgerArgs {
    /// Write to this path instead of the configured ledger (.xlsx or .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Remove a ledger lock left behind by an interrupted run
    #[arg(long)]
    force: bool,
}

pub fn run(args: LedgerArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let target = args.output.unwrap_or(config.ledger_path);

    if args.force {
        if let Some(lock) = LedgerLock::clear(&target)? {
            println!("{} Removed ledger lock {}", style("!").yellow(), lock.display());
        }
    }

    let store = RecordStore::new(config.output_dir, config.store);
    let aggregator = SummaryAggregator::new(store, target);
    let ledger = match aggregator.aggregate() {
        Ok(ledger) => ledger,
        Err(LedgerError::Busy(lock)) => anyhow::bail!(
            "Ledger is locked by another run ({}). If no run is active, retry with --force.",
            lock.display()
        ),
        Err(e) => return Err(e.into()),
    };

    println!(
        "{} Ledger written to {} ({} rows, {} skipped)",
        style("✓").green(),
        aggregator.ledger_path().display(),
        ledger.rows.len(),
        ledger.skipped
    );
    for row in &ledger.rollup {
        println!(
            "  {:<14} {:>12.2}  ({} records)",
            row.type_code, row.total_charge, row.records
        );
    }

    Ok(())
}
