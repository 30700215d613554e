//! Shared test helpers for Drive API integration tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use wiremock::MockServer;

use zmsync_core::ports::Credential;
use zmsync_drive::auth::{DriveAuthenticator, NonInteractivePrompt};
use zmsync_drive::client::DriveClient;
use zmsync_drive::provider::DriveRemoteStore;

pub const ACCESS_TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a store whose client points at it
pub async fn setup_drive_mock() -> (MockServer, DriveRemoteStore) {
    let server = MockServer::start().await;
    let store = DriveRemoteStore::new(
        DriveClient::with_base_url(server.uri()),
        DriveAuthenticator::new(Arc::new(NonInteractivePrompt)),
    );
    (server, store)
}

pub fn credential() -> Credential {
    Credential {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: Some("test-refresh-token".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Writes an installed-app client secret whose token endpoint is `token_uri`
pub fn write_client_secret(dir: &Path, token_uri: &str) -> PathBuf {
    let path = dir.join("client_secret.json");
    let json = serde_json::json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
            "redirect_uris": ["http://localhost"]
        }
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&json).unwrap()).unwrap();
    path
}
