//! Archive producer port (driven/secondary port)
//!
//! Turns one event directory into one compressed archive file plus its
//! content checksum. Implementations live in `zmsync-sync`: a native zip
//! writer and one that shells out to an external `zip` program.

use std::path::Path;

use crate::domain::archive::ArchiveFile;
use crate::domain::event::EventDirectory;

/// Port trait for producing archives from event directories
///
/// ## Implementation Notes
///
/// - The archive is written into `out_dir` under
///   [`archive_file_name`](crate::domain::archive_file_name) of the source
///   path, overwriting any file already there.
/// - Archiving the same unchanged directory twice must yield byte-identical
///   output (and therefore the same checksum).
/// - Failure affects only the one directory; the caller decides whether to
///   continue with the rest.
#[async_trait::async_trait]
pub trait IArchiveProducer: Send + Sync {
    /// Compresses `source` recursively into `out_dir`
    async fn archive(&self, source: &EventDirectory, out_dir: &Path)
        -> anyhow::Result<ArchiveFile>;
}
