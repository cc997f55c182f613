//! SOVA CLI
//!
//! Command-line interface for SOVA - subspace outlier dataset import and export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sova_core::{Config, Database, Selection, StorageError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "sova")]
#[command(about = "SOVA - Subspace outlier dataset import and export")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Store file to use instead of the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a dataset and its outlierness companion file
    Import {
        /// Primary data file (.csv, .txt or .arff)
        data: PathBuf,
        /// Companion file with subspace declarations and scores
        companion: PathBuf,
        /// Objects written per transaction
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Export the stored dataset
    Export {
        /// Target file, its extension selects the format
        target: PathBuf,
        /// Also write the per-subspace scores
        #[arg(long)]
        outlierness: bool,
        /// Companion file path (default: <stem>.outlierness.txt)
        #[arg(long)]
        companion: Option<PathBuf>,
        /// Object positions to export, e.g. "0-9,42"
        #[arg(long)]
        select: Option<Selection>,
    },
    /// Show store status
    Status,
    /// List supported file formats
    Formats,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database_file, batch_size, class_label_pattern, outlierness_prefix)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let result = run(cli, &output);

    if let Err(ref e) = result {
        if let Some(hint) = recovery_suggestion(e) {
            output.hint(hint);
        }
    }
    result
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    if let Commands::Config { command } = &cli.command {
        return match command.clone().unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => commands::config::show(output),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value, output),
        };
    }

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Import {
            data,
            companion,
            batch_size,
        } => {
            let mut db = open_store(cli.db.as_ref(), &config)?;
            commands::import::run(&config, &mut db, &data, &companion, batch_size, output)?;
            db.close().context("Failed to close store")?;
        }
        Commands::Export {
            target,
            outlierness,
            companion,
            select,
        } => {
            let db = open_store(cli.db.as_ref(), &config)?;
            commands::export::run(&config, &db, &target, outlierness, companion, select, output)?;
        }
        Commands::Status => {
            let db = open_store(cli.db.as_ref(), &config)?;
            commands::status::show(&db, output)?;
        }
        Commands::Formats => commands::formats::list(&config, output)?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Open the store named by `--db`, or the configured one
fn open_store(db: Option<&PathBuf>, config: &Config) -> Result<Database> {
    let path = match db {
        Some(path) => path.clone(),
        None => {
            config.ensure_data_dir()?;
            config.database_path()
        }
    };

    debug!("Opening store {:?}", path);
    Database::open(&path).with_context(|| format!("Failed to open store {:?}", path))
}

/// Set up tracing to stderr
///
/// `SOVA_LOG` takes a full filter directive and wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_env("SOVA_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("sova_core={level},sova_cli={level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn recovery_suggestion(error: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = error.downcast_ref::<sova_core::Error>() {
        return e.recovery_suggestion();
    }
    error
        .downcast_ref::<StorageError>()
        .and_then(StorageError::recovery_suggestion)
}
