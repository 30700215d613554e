//! Sync command - Upload new event archives to Google Drive
//!
//! Provides the `zmsync sync` CLI command which:
//! 1. Merges command-line flags over the loaded configuration
//! 2. Creates the adapters (discovery, archiver, Drive store, console reporter)
//! 3. Runs the SyncOrchestrator and maps its outcome to an exit status

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use zmsync_core::config::{ArchiverKind, Config, ConfigBuilder};
use zmsync_core::domain::DateRange;
use zmsync_core::ports::IArchiveProducer;
use zmsync_drive::auth::{
    ClientCredentials, IAuthorizationPrompt, LoopbackPrompt, NonInteractivePrompt, TerminalPrompt,
};
use zmsync_drive::provider::DriveRemoteStore;
use zmsync_sync::archive::{CommandArchiveProducer, ZipArchiveProducer};
use zmsync_sync::discovery::EventDiscovery;
use zmsync_sync::engine::{RetryPolicy, SyncOptions, SyncOrchestrator, SyncReport};
use zmsync_sync::SyncError;

use super::{expand_tilde, CommandContext, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::output::{get_formatter, ConsoleStatusReporter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Events root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// OAuth client-secret JSON file
    #[arg(long)]
    pub client_secret: Option<PathBuf>,

    /// Directory holding the cached credential
    #[arg(long)]
    pub token_dir: Option<PathBuf>,

    /// Only events strictly after this date or date-time
    #[arg(long)]
    pub from: Option<String>,

    /// Only events strictly before this date or date-time
    #[arg(long)]
    pub to: Option<String>,

    /// Remote directory name
    #[arg(long)]
    pub remote_dir: Option<String>,

    /// Archive and compare, but upload nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Fail instead of asking for authorization
    #[arg(long)]
    pub no_prompt: bool,

    /// Archive backend: native or command
    #[arg(long)]
    pub archiver: Option<ArchiverKind>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<u8> {
        let formatter = get_formatter(ctx.format, ctx.quiet);

        let config = self.merge_config(ctx.config.clone());
        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration:\n  {}", details.join("\n  "));
        }

        let options = self.options(&config)?;
        info!(
            root = %options.root.display(),
            remote_dir = %options.remote_dir,
            range = %options.range,
            "Starting sync"
        );

        let archiver: Arc<dyn IArchiveProducer> = match config.sync.archiver {
            ArchiverKind::Native => Arc::new(ZipArchiveProducer::new()),
            ArchiverKind::Command => {
                Arc::new(CommandArchiveProducer::new(config.sync.zip_program.clone()))
            }
        };
        let prompt = select_prompt(
            config.auth.interactive && !self.no_prompt,
            &options.client_secret,
        );
        let remote = Arc::new(DriveRemoteStore::with_prompt(prompt));
        let reporter = Arc::new(ConsoleStatusReporter::new(get_formatter(
            ctx.format, ctx.quiet,
        )));

        let orchestrator = SyncOrchestrator::new(
            remote,
            archiver,
            EventDiscovery::new(&config.sync.image_extensions),
            reporter,
        );

        let result = orchestrator.run(&options).await;
        let code = exit_code(&result);
        let report = result?;
        print_report(&report, ctx.format, &*formatter);
        Ok(code)
    }

    /// Applies command-line flags on top of the file configuration
    fn merge_config(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(root) = &self.root {
            builder = builder.sync_root(root.clone());
        }
        if let Some(secret) = &self.client_secret {
            builder = builder.auth_client_secret(secret.clone());
        }
        if let Some(dir) = &self.token_dir {
            builder = builder.auth_token_dir(dir.clone());
        }
        if let Some(name) = &self.remote_dir {
            builder = builder.sync_remote_dir(name.clone());
        }
        if let Some(archiver) = self.archiver {
            builder = builder.sync_archiver(archiver);
        }
        if self.no_prompt {
            builder = builder.auth_interactive(false);
        }
        builder.build()
    }

    fn options(&self, config: &Config) -> Result<SyncOptions> {
        let root = config
            .sync
            .root
            .as_deref()
            .map(expand_tilde)
            .context("No events root; pass --root or set sync.root in the config file")?;
        let client_secret = config
            .auth
            .client_secret
            .as_deref()
            .map(expand_tilde)
            .context(
                "No client secret; pass --client-secret or set auth.client_secret in the config file",
            )?;
        let range = DateRange::parse(self.from.as_deref(), self.to.as_deref())
            .context("Invalid date range")?;

        let mut options =
            SyncOptions::new(root, client_secret, expand_tilde(&config.auth.token_dir));
        options.range = range;
        options.remote_dir = config.sync.remote_dir.clone();
        options.archive_concurrency = config.sync.archive_concurrency;
        options.upload_concurrency = config.sync.upload_concurrency;
        options.retry = RetryPolicy {
            max_retries: config.sync.max_retries,
            ..RetryPolicy::default()
        };
        options.scratch_parent = config.sync.scratch_dir.as_deref().map(expand_tilde);
        options.dry_run = self.dry_run;
        Ok(options)
    }
}

/// Picks how the user is asked for an authorization code
///
/// The browser flow is used when the client registration allows a loopback
/// redirect; otherwise the code is pasted into the terminal.
pub fn select_prompt(interactive: bool, client_secret: &std::path::Path) -> Arc<dyn IAuthorizationPrompt> {
    if !interactive {
        return Arc::new(NonInteractivePrompt);
    }
    match ClientCredentials::load(client_secret) {
        Ok(credentials) if credentials.loopback_redirect().is_some() => {
            Arc::new(LoopbackPrompt::default())
        }
        _ => Arc::new(TerminalPrompt),
    }
}

/// Maps a run outcome to the process exit status
pub fn exit_code(result: &Result<SyncReport, SyncError>) -> u8 {
    match result {
        Ok(report) if report.has_failures() => EXIT_PARTIAL,
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FATAL,
    }
}

fn print_report(report: &SyncReport, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format == OutputFormat::Json {
        formatter.print_json(&serde_json::to_value(report).unwrap_or_default());
        return;
    }

    let duration_display = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };
    formatter.info(&format!(
        "Uploaded: {}  Skipped: {}  ({})",
        report.uploaded.len(),
        report.skipped.len(),
        duration_display
    ));

    let failures = report.archive_failures.len() + report.upload_failures.len();
    if failures > 0 {
        formatter.error(&format!(
            "{} item{} failed:",
            failures,
            if failures == 1 { "" } else { "s" }
        ));
        for failed in report.archive_failures.iter().chain(&report.upload_failures) {
            eprintln!("  - {}: {}", failed.item, failed.error);
        }
    }
}
