//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the handful of Drive endpoints zmsync
//! needs: folder lookup and creation, and paginated file listings. Uploads
//! live in [`crate::upload`].
//!
//! The client holds no token; every call takes the [`Credential`] to use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zmsync_drive::client::DriveClient;
//! # use zmsync_core::ports::Credential;
//!
//! # async fn example(credential: Credential) -> anyhow::Result<()> {
//! let client = DriveClient::new();
//! if let Some(folder) = client.find_folder("zm-events", &credential).await? {
//!     println!("{} has id {}", folder.name, folder.id);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};
use zmsync_core::ports::Credential;

use crate::DriveError;

/// Base URL for Google APIs
const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

/// Files collection path
pub(crate) const FILES_PATH: &str = "/drive/v3/files";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Largest page size the files.list endpoint accepts
const PAGE_SIZE: &str = "1000";

// ============================================================================
// Drive API response types
// ============================================================================

/// A file or folder resource, restricted to the fields zmsync requests
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Present for binary content, absent for folders and Google Docs
    pub md5_checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for the Drive v3 REST API
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    pub fn new() -> Self {
        Self::with_base_url(DRIVE_BASE_URL)
    }

    /// Creates a client against a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for `path` under the base URL
    pub fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&credential.access_token)
    }

    /// Finds a non-trashed folder named exactly `name` at the root of the
    /// user's Drive
    ///
    /// Drive folder names are not unique; the first exact match wins.
    #[instrument(skip(self, credential))]
    pub async fn find_folder(&self, name: &str, credential: &Credential) -> Result<Option<DriveFile>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false and 'root' in parents",
            escape_query_value(name),
            FOLDER_MIME_TYPE
        );

        let folders = self.list_all(&query, "nextPageToken, files(id, name)", credential).await?;
        let found = folders.into_iter().find(|folder| folder.name == name);

        debug!(found = found.is_some(), "Folder lookup complete");
        Ok(found)
    }

    /// Creates a folder named `name` at the root of the user's Drive
    #[instrument(skip(self, credential))]
    pub async fn create_folder(&self, name: &str, credential: &Credential) -> Result<DriveFile> {
        let response = self
            .request(Method::POST, FILES_PATH, credential)
            .query(&[("fields", "id, name")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()
            .await
            .map_err(DriveError::from)?;

        let folder: DriveFile = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))
            .context("Failed to parse created folder")?;

        info!(id = %folder.id, "Folder created");
        Ok(folder)
    }

    /// Lists every non-trashed file of `mime_type` directly inside `folder_id`
    #[instrument(skip(self, credential))]
    pub async fn list_files(
        &self,
        mime_type: &str,
        folder_id: &str,
        credential: &Credential,
    ) -> Result<Vec<DriveFile>> {
        let query = format!(
            "mimeType = '{}' and trashed = false and '{}' in parents",
            escape_query_value(mime_type),
            escape_query_value(folder_id)
        );

        let files = self
            .list_all(&query, "nextPageToken, files(id, name, md5Checksum)", credential)
            .await?;

        debug!(count = files.len(), "Listing complete");
        Ok(files)
    }

    /// Runs a files.list query, following `nextPageToken` until exhausted
    async fn list_all(&self, query: &str, fields: &str, credential: &Credential) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.request(Method::GET, FILES_PATH, credential).query(&[
                ("q", query),
                ("fields", fields),
                ("pageSize", PAGE_SIZE),
                ("spaces", "drive"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(DriveError::from)?;
            let page: FileListResponse = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| DriveError::InvalidResponse(e.to_string()))
                .context("Failed to parse file listing")?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }
}

/// Escapes a literal for use inside a single-quoted Drive query string
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Passes successful responses through and classifies the rest
pub(crate) async fn check_status(response: Response) -> Result<Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(DriveError::from_status(status, retry_after, &body))
}
