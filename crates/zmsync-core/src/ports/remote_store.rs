//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for the cloud storage location that
//! archives are synchronized to. The primary implementation targets Google
//! Drive, but the trait only describes what the sync orchestrator needs:
//! authentication, a target directory, a listing of existing archives with
//! checksums, and uploads.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - The [`Credential`] is passed explicitly to every call. Adapters hold no
//!   ambient authentication state, so test doubles and parallel runs need
//!   no shared setup.
//! - Deduplication is not the store's concern: `upload` always uploads.
//! - Retry decisions belong to the adapter that produced the error:
//!   [`IRemoteStore::classify_error`] maps its typed errors to an
//!   [`ErrorClass`]. Message matching is only the fallback.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::archive::Checksum;
use crate::domain::plan::RemoteManifestEntry;

/// File name of the cached credential inside the token directory
pub const CREDENTIAL_FILE_NAME: &str = "credentials.json";

// ============================================================================
// Credential
// ============================================================================

/// OAuth access credential for the remote store
///
/// Serialized as-is into the token cache file so later runs can reuse or
/// refresh it without interactive authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// Handles
// ============================================================================

/// A directory on the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHandle {
    /// Provider-specific directory identifier
    pub id: String,
    /// Directory name
    pub name: String,
}

/// A file created on the remote store by an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Provider-specific file identifier
    pub id: String,
    /// File name on the remote store
    pub name: String,
    /// Content checksum, when the store reports one
    pub checksum: Option<Checksum>,
}

// ============================================================================
// ErrorClass
// ============================================================================

/// Phrases that mark an untyped error as transient
const TRANSIENT_PHRASES: &[&str] = &[
    "network error",
    "connection refused",
    "connection reset",
    "connection closed",
    "reset by peer",
    "broken pipe",
    "timed out",
    "timeout",
    "too many requests",
    "rate limit",
    "server error",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
];

/// Whether retrying a failed remote call can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network trouble, rate limiting or a server-side failure
    Transient {
        /// Delay the store asked for before the next attempt
        retry_after: Option<Duration>,
    },
    /// Anything else; retrying would fail the same way
    Permanent,
}

impl ErrorClass {
    /// Transient with no requested delay
    pub const TRANSIENT: ErrorClass = ErrorClass::Transient { retry_after: None };

    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorClass::Transient { .. })
    }

    /// Guesses the class of an error from its message chain
    ///
    /// For errors no adapter could classify. Matches whole phrases only,
    /// never bare status codes, so paths and identifiers that happen to
    /// contain digits like `500` stay permanent.
    pub fn from_message(err: &anyhow::Error) -> ErrorClass {
        let text = format!("{err:#}").to_lowercase();
        if TRANSIENT_PHRASES.iter().any(|phrase| text.contains(phrase)) {
            ErrorClass::TRANSIENT
        } else {
            ErrorClass::Permanent
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for remote storage operations
///
/// ## Implementation Notes
///
/// - `ensure_directory` must be idempotent: an existing, non-trashed
///   directory with exactly the given name is returned instead of creating
///   a duplicate.
/// - `list_files` must return every matching file, following pagination.
/// - Timeouts are whatever the underlying HTTP client uses.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Obtains or refreshes an access credential
    ///
    /// # Arguments
    /// * `secret_path` - OAuth client-secret file
    /// * `token_cache` - File holding the persisted credential; created or
    ///   overwritten when a new credential is obtained
    ///
    /// May require one-time interactive authorization.
    async fn authenticate(&self, secret_path: &Path, token_cache: &Path)
        -> anyhow::Result<Credential>;

    /// Returns the root-level directory named `name`, creating it if absent
    async fn ensure_directory(
        &self,
        name: &str,
        credential: &Credential,
    ) -> anyhow::Result<DirectoryHandle>;

    /// Lists non-trashed files of `mime_type` inside `directory`
    async fn list_files(
        &self,
        mime_type: &str,
        directory: &DirectoryHandle,
        credential: &Credential,
    ) -> anyhow::Result<Vec<RemoteManifestEntry>>;

    /// Uploads `local_path` into `directory` under its file name
    ///
    /// The content type is inferred from the file extension.
    async fn upload(
        &self,
        local_path: &Path,
        directory: &DirectoryHandle,
        credential: &Credential,
    ) -> anyhow::Result<FileHandle>;

    /// Classifies an error returned by one of the calls above
    ///
    /// Adapters override this to inspect their own error types; the
    /// default falls back to [`ErrorClass::from_message`].
    fn classify_error(&self, err: &anyhow::Error) -> ErrorClass {
        ErrorClass::from_message(err)
    }
}
