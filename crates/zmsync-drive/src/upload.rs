//! File uploads to Google Drive
//!
//! Uses the multipart upload API (`uploadType=multipart`): one
//! `multipart/related` request carrying the JSON metadata part followed by
//! the file bytes. Event archives are small enough that the resumable
//! protocol is not worth its extra round trips.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, instrument};
use zmsync_core::ports::Credential;

use crate::client::{check_status, DriveClient, DriveFile};
use crate::DriveError;

/// Upload endpoint path
const UPLOAD_PATH: &str = "/upload/drive/v3/files";

/// Separator between the metadata and media parts
const BOUNDARY: &str = "zmsync_multipart_boundary_5d1f0c7a";

/// Content type for `path`, guessed from its extension
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Builds a `multipart/related` body from JSON metadata and media bytes
fn multipart_body(metadata: &serde_json::Value, media_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Type: {media_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Uploads `local_path` into the folder `parent_id` under the file's own name
///
/// Always creates a new file; Drive allows duplicate names.
///
/// # Returns
/// The created file with the checksum Drive computed
#[instrument(skip(client, credential), fields(path = %local_path.display()))]
pub async fn upload_file(
    client: &DriveClient,
    local_path: &Path,
    parent_id: &str,
    credential: &Credential,
) -> Result<DriveFile> {
    let name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", local_path.display()))?;

    let data = tokio::fs::read(local_path)
        .await
        .with_context(|| format!("Failed to read {}", local_path.display()))?;
    let media_type = content_type_for(local_path);
    debug!(bytes = data.len(), %media_type, "Uploading file");

    let metadata = json!({ "name": name, "parents": [parent_id] });
    let body = multipart_body(&metadata, &media_type, &data);

    let response = client
        .request(Method::POST, UPLOAD_PATH, credential)
        .query(&[
            ("uploadType", "multipart"),
            ("fields", "id, name, md5Checksum"),
        ])
        .header(
            reqwest::header::CONTENT_TYPE,
            format!("multipart/related; boundary={BOUNDARY}"),
        )
        .body(body)
        .send()
        .await
        .map_err(DriveError::from)?;

    let file: DriveFile = check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))
        .context("Failed to parse upload response")?;

    debug!(id = %file.id, "Upload completed");
    Ok(file)
}
