//! zmsync CLI - Upload ZoneMinder event directories to Google Drive
//!
//! Provides commands for:
//! - Synchronizing new event archives
//! - Authorizing with Google Drive and managing the cached credential
//! - Generating shell completions

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zmsync_core::config::Config;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, completions::CompletionsCommand, sync::SyncCommand, CommandContext,
    EXIT_FATAL,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "zmsync",
    version,
    about = "Incrementally upload ZoneMinder events to Google Drive"
)]
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

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload event directories not yet present on Google Drive
    Sync(SyncCommand),
    /// Authorization commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// `RUST_LOG` wins, then `-v`, then the configured level
fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let formatter = get_formatter(format, cli.quiet);

    // An explicit --config must exist; the default location is optional
    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                formatter.error(&format!("Failed to load {}: {e:#}", path.display()));
                return ExitCode::from(EXIT_FATAL);
            }
        },
        None => Config::load_or_default(&Config::default_path()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.logging.level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CommandContext {
        format,
        quiet: cli.quiet,
        config,
    };

    let result = match &cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            ExitCode::from(EXIT_FATAL)
        }
    }
}
