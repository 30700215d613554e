//! Remote manifest snapshot and the upload plan derived from it

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::archive::{ArchiveFile, Checksum};

/// An archive already present in the remote target directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteManifestEntry {
    /// Provider-specific file identifier
    pub id: String,
    /// File name on the remote store
    pub name: String,
    /// Content checksum reported by the remote store
    pub checksum: Checksum,
}

/// The work for one run: archives to upload and archives already present
///
/// Computed once from a single manifest snapshot; the manifest is not
/// refreshed while uploads are in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Archives whose checksum is absent from the manifest
    pub to_upload: Vec<ArchiveFile>,
    /// Archives whose checksum the remote store already holds
    pub skipped: Vec<ArchiveFile>,
}

impl SyncPlan {
    /// Partitions `archives` by whether their checksum appears in `manifest`
    ///
    /// Matching is by content checksum only; remote names are ignored, so a
    /// renamed remote copy still counts as present.
    #[must_use]
    pub fn compute(archives: Vec<ArchiveFile>, manifest: &[RemoteManifestEntry]) -> Self {
        let remote: HashSet<&Checksum> = manifest.iter().map(|entry| &entry.checksum).collect();

        let (skipped, to_upload) = archives
            .into_iter()
            .partition(|archive| remote.contains(&archive.checksum));

        Self { to_upload, skipped }
    }

    /// Returns true if nothing needs uploading
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty()
    }
}
