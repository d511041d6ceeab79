//! Subcommands and the helpers they share.

pub mod config;
pub mod ledger;
pub mod process;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use kabalot_core::pipeline::ProgressCallback;
use kabalot_core::{BatchReport, KabalotConfig, Pipeline, Secrets};

fn config_home() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kabalot")
}

pub fn default_config_path() -> PathBuf {
    config_home().join("config.json")
}

pub fn default_secrets_path() -> PathBuf {
    config_home().join("secrets.json")
}

/// Load and validate the configuration from `path` or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<KabalotConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        anyhow::bail!(
            "No config file at {}. Run 'kabalot config init' to create one.",
            path.display()
        );
    }
    Ok(KabalotConfig::from_file(&path)?)
}

/// Build a pipeline against the live services.
pub fn live_pipeline(config: KabalotConfig) -> anyhow::Result<Pipeline> {
    let secrets_path = config
        .secrets_path
        .clone()
        .unwrap_or_else(default_secrets_path);
    let secrets = Secrets::load(Some(&secrets_path))?;
    Ok(Pipeline::from_config(config, &secrets)?)
}

/// Progress bar over `len` files, plus the callback that advances it.
pub fn file_progress(len: usize) -> anyhow::Result<(ProgressBar, ProgressCallback)> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    let bar = pb.clone();
    let callback: ProgressCallback = Arc::new(move |path: &Path, _ok: bool| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(name);
        bar.inc(1);
    });
    Ok((pb, callback))
}

/// Print the batch outcome. Fails only when the ledger could not be rebuilt.
pub fn print_report(report: &BatchReport) -> anyhow::Result<()> {
    println!();
    println!(
        "{} Stored {} of {} files",
        style("✓").green(),
        report.persisted.len(),
        report.attempted
    );

    for record in &report.persisted {
        println!(
            "  {} {} -> {}",
            style("•").dim(),
            record.source.display(),
            record.storage_id
        );
    }

    if !report.failures.is_empty() {
        println!(
            "{} {} files failed:",
            style("✗").red(),
            report.failures.len()
        );
        for failure in &report.failures {
            println!("  {} {}: {}", style("•").dim(), failure.path.display(), failure.error);
        }
    }

    if let Some(ledger) = &report.ledger {
        println!(
            "{} Ledger rebuilt: {} rows ({} skipped)",
            style("✓").green(),
            ledger.rows.len(),
            ledger.skipped
        );
    }

    if let Some(e) = &report.ledger_error {
        anyhow::bail!("Ledger rebuild failed: {e}");
    }

    Ok(())
}
