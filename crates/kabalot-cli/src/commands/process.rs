//! Process command - run specific files through the pipeline.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use glob::glob;
use tracing::debug;

use super::{file_progress, live_pipeline, load_config, print_report};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Print the stored record of each file
    #[arg(long)]
    show: bool,
}

/// Expand patterns into a sorted, de-duplicated file list.
fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for entry in glob(pattern)? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
        if files.len() == before {
            anyhow::bail!("No matching files found for pattern: {pattern}");
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let files = expand_inputs(&args.inputs)?;
    debug!(count = files.len(), "Expanded input patterns");

    println!(
        "{} Processing {} files",
        style("ℹ").blue(),
        files.len()
    );

    let (pb, progress) = file_progress(files.len())?;
    let pipeline = live_pipeline(config)?.with_progress(progress);
    let report = pipeline.run_files(files).await;
    pb.finish_with_message("Complete");

    if args.show {
        for persisted in &report.persisted {
            let record = pipeline.store().load(&persisted.storage_id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    print_report(&report)
}
