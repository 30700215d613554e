//! Archive producers (secondary/driven adapters)
//!
//! Implements [`IArchiveProducer`] twice:
//!
//! - [`ZipArchiveProducer`] writes the zip in-process with the `zip` crate.
//!   Entries carry no filesystem metadata: timestamps are pinned to the zip
//!   epoch (1980-01-01 00:00), permissions to `0o644`/`0o755`, no extra
//!   fields, entries in sorted order. Identical directory contents always
//!   produce identical bytes.
//! - [`CommandArchiveProducer`] runs an external `zip -Xq` over a staged copy
//!   of the directory. The copies get the same pinned timestamps and
//!   permissions, and `zip` runs with `TZ=UTC` on a sorted name list, so
//!   its output is just as stable.
//!
//! Entry names are the source path's normal components joined with `/`
//! (root and prefix stripped), which is how `zip -r` names them.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};
use zmsync_core::domain::{archive_file_name, ArchiveFile, EventDirectory};
use zmsync_core::ports::IArchiveProducer;

use crate::checksum::md5_file;
use crate::ArchiveError;

/// Deflate level used by the native producer (zip's default)
const COMPRESSION_LEVEL: i64 = 6;

const FILE_PERMISSIONS: u32 = 0o644;
const DIR_PERMISSIONS: u32 = 0o755;

/// Default external compressor
pub const DEFAULT_ZIP_PROGRAM: &str = "zip";

/// 1980-01-01 00:00:00 UTC, the earliest time a zip entry can carry
const ZIP_EPOCH_UNIX_SECS: u64 = 315_532_800;

// ============================================================================
// Shared helpers
// ============================================================================

/// Name of `path` inside an archive: its normal components joined with `/`
pub fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn ensure_directory(source: &EventDirectory) -> Result<(), ArchiveError> {
    match tokio::fs::metadata(source.path()).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ArchiveError::NotADirectory(source.path().to_path_buf())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(ArchiveError::NotADirectory(source.path().to_path_buf()))
        }
        Err(err) => Err(ArchiveError::Io(err)),
    }
}

/// Stats and checksums a finished archive
async fn describe(source: &EventDirectory, target: PathBuf) -> Result<ArchiveFile, ArchiveError> {
    let size_bytes = tokio::fs::metadata(&target).await?.len();
    let checksum = md5_file(&target).await?;

    info!(
        source = %source,
        archive = %target.display(),
        size_bytes,
        checksum = %checksum,
        "Archive created"
    );

    Ok(ArchiveFile {
        source: source.clone(),
        path: target,
        checksum,
        size_bytes,
    })
}

// ============================================================================
// ZipArchiveProducer
// ============================================================================

/// Native, deterministic zip writer
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveProducer;

impl ZipArchiveProducer {
    /// Create a new `ZipArchiveProducer`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes `source` recursively into a zip at `target`
    fn write_zip(source: &Path, target: &Path) -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(BufWriter::new(File::create(target)?));

        let file_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(FILE_PERMISSIONS);
        let dir_options = file_options.unix_permissions(DIR_PERMISSIONS);

        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let name = entry_name(entry.path());
            let file_type = entry.file_type();

            if file_type.is_dir() {
                zip.add_directory(name, dir_options)?;
            } else if file_type.is_file() {
                zip.start_file(name, file_options)?;
                let mut input = File::open(entry.path())?;
                std::io::copy(&mut input, &mut zip)?;
            } else {
                debug!(path = %entry.path().display(), "Skipping non-regular entry");
            }
        }

        zip.finish()?.flush()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IArchiveProducer for ZipArchiveProducer {
    #[instrument(skip_all, fields(source = %source))]
    async fn archive(
        &self,
        source: &EventDirectory,
        out_dir: &Path,
    ) -> anyhow::Result<ArchiveFile> {
        ensure_directory(source).await?;

        let target = out_dir.join(archive_file_name(source.path()));
        let (src, dst) = (source.path().to_path_buf(), target.clone());
        tokio::task::spawn_blocking(move || Self::write_zip(&src, &dst))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::new(ErrorKind::Other, err)))??;

        Ok(describe(source, target).await?)
    }
}

// ============================================================================
// CommandArchiveProducer
// ============================================================================

/// Archive producer that shells out to an external `zip` program
#[derive(Debug, Clone)]
pub struct CommandArchiveProducer {
    program: String,
}

impl Default for CommandArchiveProducer {
    fn default() -> Self {
        Self::new(DEFAULT_ZIP_PROGRAM)
    }
}

impl CommandArchiveProducer {
    /// Uses `program` (looked up on `PATH` unless absolute) as the compressor
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Copies `source` below `stage` under its entry name, with pinned
    /// permissions and timestamps
    ///
    /// Returns the entry names in archive order.
    fn stage(source: &Path, stage: &Path) -> Result<Vec<String>, ArchiveError> {
        let epoch = SystemTime::UNIX_EPOCH + Duration::from_secs(ZIP_EPOCH_UNIX_SECS);
        let mut names = Vec::new();
        let mut dirs = Vec::new();

        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let name = entry_name(entry.path());
            let staged = stage.join(&name);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir_all(&staged)?;
                dirs.push(staged);
            } else if file_type.is_file() {
                std::fs::copy(entry.path(), &staged)?;
                pin_metadata(&staged, FILE_PERMISSIONS, epoch)?;
            } else {
                debug!(path = %entry.path().display(), "Skipping non-regular entry");
                continue;
            }
            names.push(name);
        }

        // Writing children bumps a directory's mtime, so pin them last
        for dir in dirs.iter().rev() {
            pin_metadata(dir, DIR_PERMISSIONS, epoch)?;
        }
        Ok(names)
    }

    async fn run_zip(&self, stage: &Path, names: &[String], target: &Path) -> Result<(), ArchiveError> {
        // zip adds to an existing archive instead of replacing it
        match tokio::fs::remove_file(target).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(ArchiveError::Io(err)),
        }

        let mut child = tokio::process::Command::new(&self.program)
            .args(["-X", "-q", "-@"])
            .arg(target)
            .current_dir(stage)
            .env("TZ", "UTC")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    ArchiveError::CompressorUnavailable {
                        program: self.program.clone(),
                    }
                }
                _ => ArchiveError::Io(err),
            })?;

        let mut list = names.join("\n");
        list.push('\n');
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(list.as_bytes()).await,
            None => Ok(()),
        };

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ArchiveError::CompressorFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        Ok(())
    }
}

/// Sets `path`'s permissions (on unix) and modification time
fn pin_metadata(path: &Path, mode: u32, modified: SystemTime) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    let handle = if path.is_dir() {
        File::open(path)?
    } else {
        File::options().write(true).open(path)?
    };
    handle.set_modified(modified)
}

/// Makes `path` absolute against the working directory
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[async_trait::async_trait]
impl IArchiveProducer for CommandArchiveProducer {
    #[instrument(skip_all, fields(source = %source, program = %self.program))]
    async fn archive(
        &self,
        source: &EventDirectory,
        out_dir: &Path,
    ) -> anyhow::Result<ArchiveFile> {
        ensure_directory(source).await?;

        let target = absolute(&out_dir.join(archive_file_name(source.path())))?;
        let stage = tempfile::Builder::new()
            .prefix(".zmsync-stage-")
            .tempdir_in(out_dir)
            .map_err(ArchiveError::Io)?;

        let (src, dst) = (source.path().to_path_buf(), stage.path().to_path_buf());
        let names = tokio::task::spawn_blocking(move || Self::stage(&src, &dst))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::new(ErrorKind::Other, err)))??;

        let zipped = self.run_zip(stage.path(), &names, &target).await;
        let stage_path = stage.path().to_path_buf();
        if let Err(err) = stage.close() {
            warn!(stage = %stage_path.display(), error = %err, "Failed to remove staging directory");
        }
        zipped?;

        Ok(describe(source, target).await?)
    }
}
