//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use kabalot_core::{ConfigFile, Secrets};

use super::{default_config_path, default_secrets_path};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Show configuration file path
    Path,

    /// Validate configuration and credentials
    Check,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, &path),
        ConfigCommand::Path => show_path(&path),
        ConfigCommand::Check => check_config(&path),
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    let config = if path.exists() {
        ConfigFile::from_file(path)?
    } else {
        println!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
        ConfigFile::default()
    };

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs, default_path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| default_path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    ConfigFile::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );
    println!("Fill in input_dirs, output_dir, upload_path and ledger_path, then run 'kabalot config check'.");

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'kabalot config init' to create a configuration file.");
    }

    Ok(())
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let file = ConfigFile::from_file(path)?;
    let config = file.resolve()?;
    println!("{} Configuration is complete", style("✓").green());

    for dir in &config.input_dirs {
        if dir.is_dir() {
            println!("  {} input {}", style("✓").green(), dir.display());
        } else {
            println!("  {} input {} does not exist", style("✗").red(), dir.display());
        }
    }

    let secrets_path = config
        .secrets_path
        .clone()
        .unwrap_or_else(default_secrets_path);
    let secrets = Secrets::load(Some(&secrets_path))?;
    println!(
        "  {} credentials: openai {}, dropbox {}",
        style("✓").green(),
        secrets.openai,
        secrets.dropbox
    );

    Ok(())
}
