//! DriveRemoteStore - IRemoteStore implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and [`DriveAuthenticator`] and delegates to the
//! client, upload, and auth modules to fulfil the [`IRemoteStore`] port
//! contract.
//!
//! ## Design Notes
//!
//! - Listing entries without a usable `md5Checksum` are dropped from the
//!   manifest; they can never match a local archive anyway.
//! - Folder lookup and creation are not atomic. Two concurrent runs can
//!   both create the folder; later runs pick the first match.
//! - Errors are classified by type: [`DriveError`] knows whether it is
//!   transient, and local I/O failures never are.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use zmsync_core::domain::{Checksum, RemoteManifestEntry};
use zmsync_core::ports::{Credential, DirectoryHandle, ErrorClass, FileHandle, IRemoteStore};

use crate::auth::{DriveAuthenticator, IAuthorizationPrompt};
use crate::client::{DriveClient, DriveFile};
use crate::upload;
use crate::DriveError;

/// Converts a listing entry into a manifest entry, if it carries a checksum
fn to_manifest_entry(file: DriveFile) -> Option<RemoteManifestEntry> {
    let raw = match file.md5_checksum {
        Some(raw) => raw,
        None => {
            debug!(id = %file.id, name = %file.name, "Listing entry has no checksum");
            return None;
        }
    };

    match Checksum::new(raw) {
        Ok(checksum) => Some(RemoteManifestEntry {
            id: file.id,
            name: file.name,
            checksum,
        }),
        Err(e) => {
            warn!(id = %file.id, error = %e, "Ignoring listing entry with malformed checksum");
            None
        }
    }
}

/// [`IRemoteStore`] backed by the Google Drive v3 API
pub struct DriveRemoteStore {
    client: DriveClient,
    authenticator: DriveAuthenticator,
}

impl DriveRemoteStore {
    pub fn new(client: DriveClient, authenticator: DriveAuthenticator) -> Self {
        Self {
            client,
            authenticator,
        }
    }

    /// Creates a store against the public Drive endpoint
    pub fn with_prompt(prompt: std::sync::Arc<dyn IAuthorizationPrompt>) -> Self {
        Self::new(DriveClient::new(), DriveAuthenticator::new(prompt))
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn authenticate(&self, secret_path: &Path, token_cache: &Path) -> Result<Credential> {
        self.authenticator
            .authenticate(secret_path, token_cache)
            .await
    }

    async fn ensure_directory(&self, name: &str, credential: &Credential) -> Result<DirectoryHandle> {
        let folder = match self.client.find_folder(name, credential).await? {
            Some(folder) => {
                debug!(id = %folder.id, "Using existing folder");
                folder
            }
            None => {
                info!(%name, "Creating folder");
                self.client
                    .create_folder(name, credential)
                    .await
                    .with_context(|| format!("Failed to create folder '{name}'"))?
            }
        };

        Ok(DirectoryHandle {
            id: folder.id,
            name: name.to_string(),
        })
    }

    async fn list_files(
        &self,
        mime_type: &str,
        directory: &DirectoryHandle,
        credential: &Credential,
    ) -> Result<Vec<RemoteManifestEntry>> {
        let files = self
            .client
            .list_files(mime_type, &directory.id, credential)
            .await?;
        Ok(files.into_iter().filter_map(to_manifest_entry).collect())
    }

    async fn upload(
        &self,
        local_path: &Path,
        directory: &DirectoryHandle,
        credential: &Credential,
    ) -> Result<FileHandle> {
        let file = upload::upload_file(&self.client, local_path, &directory.id, credential).await?;

        let checksum = file
            .md5_checksum
            .as_deref()
            .and_then(|raw| Checksum::new(raw).ok());
        Ok(FileHandle {
            id: file.id,
            name: file.name,
            checksum,
        })
    }

    fn classify_error(&self, err: &anyhow::Error) -> ErrorClass {
        if let Some(drive) = err.downcast_ref::<DriveError>() {
            return drive.class();
        }
        if err.downcast_ref::<std::io::Error>().is_some() {
            return ErrorClass::Permanent;
        }
        ErrorClass::from_message(err)
    }
}
