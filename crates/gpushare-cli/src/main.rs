//! gpushare CLI
//!
//! Computes preferred device allocations from an inventory file.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gpushare_core::{LoggingConfig, PluginConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gpushare - preferred-allocation engine for shared GPU devices
#[derive(Parser, Debug)]
#[command(name = "gpushare")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Inventory file describing the node's devices
    #[arg(long, default_value = "/etc/gpushare/inventory.toml", global = true)]
    inventory: PathBuf,

    /// Plugin configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the preferred allocation for one request
    Allocate {
        /// Number of devices to allocate
        #[arg(long)]
        size: usize,

        /// Available device IDs (defaults to every known device)
        #[arg(long, value_delimiter = ',')]
        available: Vec<String>,

        /// Device IDs that must be part of the allocation
        #[arg(long, value_delimiter = ',')]
        required: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the devices in the inventory
    Devices,
}

fn init_logging(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        Level::DEBUG
    } else {
        match config.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false);

    let result = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing::subscriber::set_global_default(
                builder
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .finish(),
            )
        }
        None => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).finish(),
        ),
    };
    result.context("Failed to set subscriber")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PluginConfig::from_file(path)?,
        None => PluginConfig::default(),
    };

    init_logging(&config.logging, cli.verbose)?;

    let ctx = commands::NodeContext::load(&cli.inventory, &config)?;

    match cli.command {
        Commands::Allocate {
            size,
            available,
            required,
            json,
        } => {
            commands::allocate(&ctx, available, required, size, json)?;
        }
        Commands::Devices => {
            commands::devices(&ctx);
        }
    }

    Ok(())
}
