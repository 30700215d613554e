//! Sync orchestrator
//!
//! The [`SyncOrchestrator`] drives one complete run: it finds event
//! directories, archives them into a scratch directory, asks the remote
//! store which archives it already holds and uploads the rest.
//!
//! ## Sync Flow
//!
//! ```text
//! Idle -> Discovering -> Archiving -> Authenticating -> Planning -> Uploading -> Done
//!                                                          (any) -> Failed
//! ```
//!
//! 1. **Discovering**: walk the events root; nothing found ends the run.
//! 2. **Archiving**: archive every directory with bounded concurrency.
//!    Failures are recorded and the directory dropped.
//! 3. **Authenticating**: obtain a credential, ensure the remote directory.
//! 4. **Planning**: fetch the remote manifest once, diff by checksum.
//!    A dry run stops here.
//! 5. **Uploading**: best-effort, bounded concurrency; a failed upload
//!    never aborts the others.
//!
//! The scratch directory is removed when the run ends, whatever the outcome.
//!
//! ## Retry Logic
//!
//! Transient errors (network, rate limiting, server errors) on the manifest
//! fetch and on uploads are retried with exponential backoff: by default
//! 1s, 2s, 4s (3 retries). The remote store classifies its own errors and
//! may ask for a specific delay, as Drive does with `Retry-After`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tempfile::TempDir;
use tracing::{error, info, warn};

use zmsync_core::domain::{ArchiveFile, DateRange, EventDirectory, SyncPlan, ARCHIVE_MIME_TYPE};
use zmsync_core::ports::{
    Credential, DirectoryHandle, ErrorClass, FileHandle, IArchiveProducer, IRemoteStore,
    IStatusReporter, StatusKind, CREDENTIAL_FILE_NAME,
};

use crate::discovery::EventDiscovery;
use crate::SyncError;

// ============================================================================
// SyncPhase
// ============================================================================

/// States of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Discovering,
    Archiving,
    Authenticating,
    Planning,
    Uploading,
    Done,
    Failed,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Discovering => "discovering",
            SyncPhase::Archiving => "archiving",
            SyncPhase::Authenticating => "authenticating",
            SyncPhase::Planning => "planning",
            SyncPhase::Uploading => "uploading",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// SyncReport
// ============================================================================

/// An item that was dropped from the run, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Event directory path or archive name
    pub item: String,
    /// Error chain as text
    pub error: String,
}

impl FailedItem {
    fn new(item: impl ToString, err: &anyhow::Error) -> Self {
        Self {
            item: item.to_string(),
            error: format!("{err:#}"),
        }
    }
}

/// Summary of a completed sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Phases entered, in order
    pub phases: Vec<SyncPhase>,
    /// Number of event directories discovered
    pub discovered: usize,
    /// Number of archives produced
    pub archived: usize,
    /// Directories whose archive could not be produced
    pub archive_failures: Vec<FailedItem>,
    /// Names of archives uploaded (or that would be, on a dry run)
    pub uploaded: Vec<String>,
    /// Names of archives the remote store already held
    pub skipped: Vec<String>,
    /// Archives whose upload failed
    pub upload_failures: Vec<FailedItem>,
    /// True if nothing was uploaded on purpose
    pub dry_run: bool,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    fn enter(&mut self, phase: SyncPhase) {
        self.phases.push(phase);
    }

    /// The last phase entered
    pub fn final_phase(&self) -> SyncPhase {
        self.phases.last().copied().unwrap_or(SyncPhase::Idle)
    }

    /// True if any archive or upload failed
    pub fn has_failures(&self) -> bool {
        !self.archive_failures.is_empty() || !self.upload_failures.is_empty()
    }
}

// ============================================================================
// Retry logic
// ============================================================================

/// Default number of retries for transient errors
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Exponential backoff for transient remote errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Executes an async operation, retrying transient failures
    ///
    /// `classify` decides which errors are transient. Permanent errors are
    /// returned immediately. A delay requested by the store replaces the
    /// backoff for that attempt.
    pub async fn run<C, F, Fut, T>(&self, operation_name: &str, classify: C, f: F) -> anyhow::Result<T>
    where
        C: Fn(&anyhow::Error) -> ErrorClass,
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let retry_after = match classify(&err) {
                        ErrorClass::Transient { retry_after } if attempt < self.max_retries => {
                            retry_after
                        }
                        _ => return Err(err),
                    };
                    let delay = retry_after.unwrap_or(self.base_delay * 2u32.saturating_pow(attempt));
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ============================================================================
// SyncOptions
// ============================================================================

/// Inputs of a single sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Events root to discover under
    pub root: PathBuf,
    /// Time window event timestamps must fall into
    pub range: DateRange,
    /// Root-level remote directory to upload into
    pub remote_dir: String,
    /// OAuth client-secret file
    pub client_secret: PathBuf,
    /// Directory holding the cached credential
    pub token_dir: PathBuf,
    /// Maximum directories archived at once
    pub archive_concurrency: usize,
    /// Maximum uploads in flight at once
    pub upload_concurrency: usize,
    /// Backoff for the manifest fetch and uploads
    pub retry: RetryPolicy,
    /// Parent of the run's scratch directory; system temp if `None`
    pub scratch_parent: Option<PathBuf>,
    /// Stop after planning without uploading
    pub dry_run: bool,
}

impl SyncOptions {
    /// Options with default concurrency, retries and remote directory
    pub fn new(root: PathBuf, client_secret: PathBuf, token_dir: PathBuf) -> Self {
        Self {
            root,
            range: DateRange::unbounded(),
            remote_dir: "zm-events".to_string(),
            client_secret,
            token_dir,
            archive_concurrency: 4,
            upload_concurrency: 2,
            retry: RetryPolicy::default(),
            scratch_parent: None,
            dry_run: false,
        }
    }

    /// The credential cache file inside the token directory
    pub fn token_cache(&self) -> PathBuf {
        self.token_dir.join(CREDENTIAL_FILE_NAME)
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Drives discovery, archiving, planning and uploads for one run
pub struct SyncOrchestrator {
    remote: Arc<dyn IRemoteStore>,
    archiver: Arc<dyn IArchiveProducer>,
    discovery: EventDiscovery,
    reporter: Arc<dyn IStatusReporter>,
}

impl SyncOrchestrator {
    /// Creates a new orchestrator
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        archiver: Arc<dyn IArchiveProducer>,
        discovery: EventDiscovery,
        reporter: Arc<dyn IStatusReporter>,
    ) -> Self {
        Self {
            remote,
            archiver,
            discovery,
            reporter,
        }
    }

    /// Executes one complete sync run
    ///
    /// # Returns
    /// A [`SyncReport`]; per-directory archive failures and per-file upload
    /// failures are recorded there rather than returned.
    ///
    /// # Errors
    /// Returns a [`SyncError`] if discovery, authentication, remote
    /// directory preparation or the manifest fetch fails.
    #[tracing::instrument(skip_all, fields(root = %options.root.display(), remote_dir = %options.remote_dir, dry_run = options.dry_run))]
    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let mut report = SyncReport {
            phases: vec![SyncPhase::Idle],
            dry_run: options.dry_run,
            ..SyncReport::default()
        };

        info!(range = %options.range, "Starting sync run");
        let outcome = self.execute(options, &mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                report.enter(SyncPhase::Done);
                self.status(StatusKind::Success, "Done!");
                info!(
                    discovered = report.discovered,
                    archived = report.archived,
                    uploaded = report.uploaded.len(),
                    skipped = report.skipped.len(),
                    archive_failures = report.archive_failures.len(),
                    upload_failures = report.upload_failures.len(),
                    duration_ms = report.duration_ms,
                    "Sync run complete"
                );
                Ok(report)
            }
            Err(err) => {
                report.enter(SyncPhase::Failed);
                error!(phase = %err.phase(), error = %err, "Sync run failed");
                Err(err)
            }
        }
    }

    async fn execute(&self, options: &SyncOptions, report: &mut SyncReport) -> Result<(), SyncError> {
        // Discovering
        report.enter(SyncPhase::Discovering);
        let discovered = self.discover(options).await?;
        report.discovered = discovered.len();
        self.status(
            StatusKind::Progress,
            &format!("Found {} event directories.", discovered.len()),
        );
        if discovered.is_empty() {
            self.status(StatusKind::Progress, "No directories to upload.");
            return Ok(());
        }

        // Archiving; the scratch directory is removed when `scratch` drops
        report.enter(SyncPhase::Archiving);
        let scratch = create_scratch(options.scratch_parent.as_deref())?;
        let archives = self
            .archive_all(&discovered, scratch.path(), options.archive_concurrency, report)
            .await;
        report.archived = archives.len();
        if archives.is_empty() {
            self.status(StatusKind::Progress, "No directories to upload.");
            close_scratch(scratch);
            return Ok(());
        }

        // Authenticating
        report.enter(SyncPhase::Authenticating);
        let credential = self
            .remote
            .authenticate(&options.client_secret, &options.token_cache())
            .await
            .map_err(SyncError::Auth)?;
        let directory = self
            .remote
            .ensure_directory(&options.remote_dir, &credential)
            .await
            .map_err(|cause| SyncError::RemoteDirectory {
                name: options.remote_dir.clone(),
                cause,
            })?;
        info!(remote_dir = %directory.name, remote_id = %directory.id, "Remote directory ready");

        // Planning
        report.enter(SyncPhase::Planning);
        let manifest = options
            .retry
            .run(
                "list_files",
                |err| self.remote.classify_error(err),
                || {
                    self.remote
                        .list_files(ARCHIVE_MIME_TYPE, &directory, &credential)
                },
            )
            .await
            .map_err(|cause| SyncError::Manifest {
                name: options.remote_dir.clone(),
                cause,
            })?;
        let plan = SyncPlan::compute(archives, &manifest);
        report.skipped = plan.skipped.iter().map(ArchiveFile::file_name).collect();
        info!(
            manifest = manifest.len(),
            to_upload = plan.to_upload.len(),
            skipped = plan.skipped.len(),
            "Upload plan computed"
        );
        self.status(
            StatusKind::Progress,
            &format!(
                "Uploading {} files, skipping {}.",
                plan.to_upload.len(),
                plan.skipped.len()
            ),
        );

        if options.dry_run {
            report.uploaded = plan.to_upload.iter().map(ArchiveFile::file_name).collect();
            self.status(StatusKind::Progress, "Dry run: nothing was uploaded.");
            close_scratch(scratch);
            return Ok(());
        }

        // Uploading
        if !plan.is_empty() {
            report.enter(SyncPhase::Uploading);
            self.upload_all(&plan, &directory, &credential, options, report)
                .await;
        }

        close_scratch(scratch);
        Ok(())
    }

    async fn discover(&self, options: &SyncOptions) -> Result<Vec<EventDirectory>, SyncError> {
        let discovery = self.discovery.clone();
        let root = options.root.clone();
        let range = options.range;

        tokio::task::spawn_blocking(move || discovery.discover(&root, &range))
            .await
            .map_err(|err| SyncError::Discovery {
                root: options.root.clone(),
                reason: err.to_string(),
            })?
    }

    async fn archive_all(
        &self,
        directories: &[EventDirectory],
        out_dir: &Path,
        concurrency: usize,
        report: &mut SyncReport,
    ) -> Vec<ArchiveFile> {
        let outcomes: Vec<(&EventDirectory, anyhow::Result<ArchiveFile>)> =
            stream::iter(directories)
                .map(|dir| async move { (dir, self.archiver.archive(dir, out_dir).await) })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

        let mut archives = Vec::with_capacity(outcomes.len());
        for (dir, outcome) in outcomes {
            match outcome {
                Ok(archive) => archives.push(archive),
                Err(err) => {
                    warn!(dir = %dir, error = %format!("{err:#}"), "Archiving failed, skipping directory");
                    self.status(
                        StatusKind::Warning,
                        &format!("Could not archive {dir}: {err:#}"),
                    );
                    report.archive_failures.push(FailedItem::new(dir, &err));
                }
            }
        }

        archives.sort_by(|a, b| a.source.cmp(&b.source));
        report.archive_failures.sort_by(|a, b| a.item.cmp(&b.item));
        archives
    }

    async fn upload_all(
        &self,
        plan: &SyncPlan,
        directory: &DirectoryHandle,
        credential: &Credential,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) {
        let retry = &options.retry;
        let outcomes: Vec<(&ArchiveFile, anyhow::Result<FileHandle>)> =
            stream::iter(&plan.to_upload)
                .map(|archive| async move {
                    let outcome = retry
                        .run(
                            "upload",
                            |err| self.remote.classify_error(err),
                            || self.remote.upload(&archive.path, directory, credential),
                        )
                        .await;
                    (archive, outcome)
                })
                .buffer_unordered(options.upload_concurrency.max(1))
                .collect()
                .await;

        for (archive, outcome) in outcomes {
            let name = archive.file_name();
            match outcome {
                Ok(handle) => {
                    info!(archive = %name, remote_id = %handle.id, "Uploaded");
                    report.uploaded.push(name);
                }
                Err(err) => {
                    warn!(archive = %name, error = %format!("{err:#}"), "Upload failed");
                    self.status(
                        StatusKind::Warning,
                        &format!("Could not upload {name}: {err:#}"),
                    );
                    report.upload_failures.push(FailedItem::new(&name, &err));
                }
            }
        }

        report.uploaded.sort();
        report.upload_failures.sort_by(|a, b| a.item.cmp(&b.item));
    }

    fn status(&self, kind: StatusKind, message: &str) {
        self.reporter.report(kind, message);
    }
}

/// Creates the run-scoped scratch directory
fn create_scratch(parent: Option<&Path>) -> Result<TempDir, SyncError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("zmsync-");

    let scratch = match parent {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(SyncError::Scratch)?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .map_err(SyncError::Scratch)?;

    info!(scratch = %scratch.path().display(), "Scratch directory created");
    Ok(scratch)
}

fn close_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        warn!(scratch = %path.display(), error = %err, "Failed to remove scratch directory");
    }
}
