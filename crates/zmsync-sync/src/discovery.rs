//! Event directory discovery
//!
//! Walks the events root, maps every image file to the directory holding it,
//! and keeps the directories whose path decodes to a timestamp inside the
//! requested [`DateRange`].
//!
//! ## Rules
//!
//! - Entries below the root whose name starts with `.` are never descended
//!   into (ZoneMinder keeps `.<event id>` links next to the time directories).
//! - Symlinks are not followed.
//! - Directories whose path does not decode are skipped with a debug log.
//! - Results are deduplicated and sorted by path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};
use zmsync_core::domain::{DateRange, EventDirectory};

use crate::SyncError;

/// Default image extensions, matched case-insensitively
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Finds event directories below a root
#[derive(Debug, Clone)]
pub struct EventDiscovery {
    image_extensions: Vec<String>,
}

impl Default for EventDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS.iter().copied())
    }
}

impl EventDiscovery {
    /// Creates a discovery that treats files with any of `extensions` as images
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let image_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { image_extensions }
    }

    /// The lowercased extensions this discovery matches
    pub fn image_extensions(&self) -> &[String] {
        &self.image_extensions
    }

    /// Returns the qualifying event directories under `root`, sorted by path
    ///
    /// Blocking; run it on the blocking pool from async code.
    ///
    /// # Errors
    /// [`SyncError::Discovery`] if `root` does not exist, is not a directory,
    /// or cannot be listed. Unreadable entries further down are logged and
    /// skipped.
    #[instrument(skip_all, fields(root = %root.display(), range = %range))]
    pub fn discover(&self, root: &Path, range: &DateRange) -> Result<Vec<EventDirectory>, SyncError> {
        let discovery_error = |reason: String| SyncError::Discovery {
            root: root.to_path_buf(),
            reason,
        };

        let metadata = std::fs::metadata(root).map_err(|err| discovery_error(err.to_string()))?;
        if !metadata.is_dir() {
            return Err(discovery_error("not a directory".to_string()));
        }
        std::fs::read_dir(root).map_err(|err| discovery_error(err.to_string()))?;

        let mut candidates: BTreeSet<PathBuf> = BTreeSet::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_image(entry.path()) {
                continue;
            }

            if let Some(parent) = entry.path().parent() {
                if !candidates.contains(parent) {
                    candidates.insert(parent.to_path_buf());
                }
            }
        }

        let mut found = Vec::with_capacity(candidates.len());
        for dir in candidates {
            if dir != root && has_hidden_name(&dir) {
                continue;
            }

            let event = match EventDirectory::from_path(&dir) {
                Ok(event) => event,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "Skipping non-event directory");
                    continue;
                }
            };

            if range.contains(event.timestamp()) {
                found.push(event);
            } else {
                debug!(dir = %dir.display(), timestamp = %event.timestamp(), "Outside date range");
            }
        }

        info!(count = found.len(), "Discovery complete");
        Ok(found)
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.image_extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_hidden_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
