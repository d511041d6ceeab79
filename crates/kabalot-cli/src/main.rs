//! CLI application for invoice and receipt bookkeeping.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{config, ledger, process, run};

/// kabalot - Turn folders of invoices into JSON records and a ledger
#[derive(Parser)]
#[command(name = "kabalot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every file in the configured input directories
    Run(run::RunArgs),

    /// Process specific files or glob patterns
    Process(process::ProcessArgs),

    /// Rebuild the ledger from stored records
    Ledger(ledger::LedgerArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => run::run(args, config_path).await,
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Ledger(args) => ledger::run(args, config_path),
        Commands::Config(args) => config::run(args, config_path),
    }
}
