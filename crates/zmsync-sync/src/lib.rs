//! zmsync Sync - Event discovery, archiving and the sync orchestrator
//!
//! Provides:
//! - Discovery of date-encoded event directories below a root
//! - Deterministic zip archives of event directories (native or via `zip`)
//! - MD5 content checksums matching Google Drive's `md5Checksum`
//! - The [`engine::SyncOrchestrator`] driving a complete sync run
//!
//! ## Modules
//!
//! - [`discovery`] - Walks the events root and selects event directories
//! - [`archive`] - [`IArchiveProducer`](zmsync_core::ports::IArchiveProducer) adapters
//! - [`checksum`] - Streaming MD5 of archive files
//! - [`engine`] - The sync state machine and run report

pub mod archive;
pub mod checksum;
pub mod discovery;
pub mod engine;

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::SyncPhase;

/// Fatal errors that abort a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The events root is missing, not a directory, or unreadable
    #[error("Cannot discover events under {}: {reason}", root.display())]
    Discovery { root: PathBuf, reason: String },

    /// Obtaining a credential failed
    #[error("Authentication failed: {0:#}")]
    Auth(anyhow::Error),

    /// The remote target directory could not be found or created
    #[error("Cannot prepare remote directory '{name}': {cause:#}")]
    RemoteDirectory { name: String, cause: anyhow::Error },

    /// Listing the remote target directory failed
    #[error("Cannot list remote directory '{name}': {cause:#}")]
    Manifest { name: String, cause: anyhow::Error },

    /// The run-scoped scratch directory could not be created
    #[error("Cannot create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
}

impl SyncError {
    /// The phase the run was in when this error stopped it
    pub fn phase(&self) -> SyncPhase {
        match self {
            SyncError::Discovery { .. } => SyncPhase::Discovering,
            SyncError::Scratch(_) => SyncPhase::Archiving,
            SyncError::Auth(_) | SyncError::RemoteDirectory { .. } => SyncPhase::Authenticating,
            SyncError::Manifest { .. } => SyncPhase::Planning,
        }
    }
}

/// Errors producing a single archive
///
/// These never abort a run; the orchestrator records them per directory.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error occurred reading the source or writing the archive
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The external compressor could not be started
    #[error("Compressor '{program}' is not available")]
    CompressorUnavailable { program: String },

    /// The external compressor exited unsuccessfully
    #[error("Compressor '{program}' failed ({status}): {stderr}")]
    CompressorFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The zip writer rejected an entry
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The source path is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}
