//! Archive files and their content checksums

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::event::EventDirectory;

/// File extension of produced archives
pub const ARCHIVE_EXTENSION: &str = "zip";

/// MIME type under which archives are listed on the remote store
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

// ============================================================================
// Checksum
// ============================================================================

/// MD5 content checksum as 32 lowercase hexadecimal characters
///
/// This is the format Google Drive reports in `md5Checksum`, so local and
/// remote checksums compare as plain strings. Upper-case input is
/// normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Number of hex characters in an MD5 digest
    const HEX_LEN: usize = 32;

    /// Create a new Checksum
    ///
    /// # Errors
    /// Returns error if the value is not 32 hexadecimal characters
    pub fn new(hex: impl Into<String>) -> Result<Self, DomainError> {
        let hex = hex.into();
        if hex.len() != Self::HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidChecksum(hex));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

// ============================================================================
// ArchiveFile
// ============================================================================

/// Returns the archive file name for an event directory
///
/// Path separators are replaced by `-` and the archive extension appended,
/// so `/events/19/03/04/21/22` becomes `-events-19-03-04-21-22.zip`. This
/// name is also the file's name on the remote store.
#[must_use]
pub fn archive_file_name(source: &Path) -> String {
    let flattened = source
        .to_string_lossy()
        .trim_end_matches(['/', '\\'])
        .replace(['/', '\\'], "-");
    format!("{flattened}.{ARCHIVE_EXTENSION}")
}

/// A compressed copy of one event directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// The directory this archive was produced from
    pub source: EventDirectory,
    /// Location of the archive in the scratch directory
    pub path: PathBuf,
    /// MD5 of the archive bytes
    pub checksum: Checksum,
    /// Archive size in bytes
    pub size_bytes: u64,
}

impl ArchiveFile {
    /// The archive's file name (also its remote name)
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive_file_name(self.source.path()))
    }
}
