//! Streaming MD5 checksums of archive files
//!
//! Google Drive reports `md5Checksum` for every uploaded file, so MD5 of the
//! archive bytes is what lets a local archive be matched against the remote
//! manifest without downloading anything.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tracing::{debug, instrument};
use zmsync_core::domain::Checksum;

use crate::ArchiveError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Computes the MD5 checksum of the file at `path` on the blocking pool
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn md5_file(path: &Path) -> Result<Checksum, ArchiveError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || md5_file_blocking(&path))
        .await
        .map_err(|err| ArchiveError::Io(std::io::Error::new(ErrorKind::Other, err)))?
}

/// Computes the MD5 checksum of the file at `path`
pub fn md5_file_blocking(path: &Path) -> Result<Checksum, ArchiveError> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let hex = format!("{:x}", hasher.finalize());
    debug!(checksum = %hex, "checksum computed");

    Checksum::new(hex)
        .map_err(|err| ArchiveError::Io(std::io::Error::new(ErrorKind::InvalidData, err)))
}
