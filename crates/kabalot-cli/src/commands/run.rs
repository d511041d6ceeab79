//! Run command - process the configured input directories.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::info;

use super::{file_progress, live_pipeline, load_config, print_report};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Input directories (overrides the config file)
    #[arg(short, long = "input-dir")]
    input_dirs: Vec<PathBuf>,

    /// Number of files processed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Only list the files that would be processed
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;

    if !args.input_dirs.is_empty() {
        config.input_dirs = args.input_dirs;
    }
    if let Some(jobs) = args.jobs {
        if jobs == 0 {
            anyhow::bail!("--jobs must be at least 1");
        }
        config.batch.file_jobs = jobs;
    }

    let pipeline = live_pipeline(config)?;
    let files = pipeline.discover_inputs()?;

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if args.dry_run {
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let (pb, progress) = file_progress(files.len())?;
    let pipeline = pipeline.with_progress(progress);
    let report = pipeline.run_files(files).await;
    pb.finish_with_message("Complete");

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Run finished");
    print_report(&report)?;
    println!(
        "{} Finished in {:.1}s",
        style("ℹ").blue(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
