//! Carelink CLI - Command-line interface for the Carelink API client
//!
//! Provides commands for:
//! - Issuing authenticated requests against the backend
//! - Viewing, validating and resolving the client configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use carelink_core::config::ClientConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod identity;
mod output;

use commands::{config::ConfigCommand, request::RequestCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "carelink", version, about = "Command-line client for the Carelink API")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send a request to the backend API
    Request(RequestCommand),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = load_config(&config_path)?;

    // Setup tracing
    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    init_tracing(level, cli.log_json || config.logging.json);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Request(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, &config, format).await,
    }
}

/// Loads the config file if it exists, then applies environment overrides
fn load_config(path: &Path) -> Result<ClientConfig> {
    let mut config = if path.exists() {
        ClientConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        ClientConfig::default()
    };
    config
        .apply_env()
        .context("Invalid environment override")?;
    Ok(config)
}

/// Logs go to stderr so response bodies on stdout stay machine-readable
fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
