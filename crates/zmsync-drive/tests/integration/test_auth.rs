//! Token cache, refresh, and interactive authorization

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zmsync_core::ports::Credential;
use zmsync_drive::auth::{
    AuthorizationRequest, DriveAuthenticator, IAuthorizationPrompt, NonInteractivePrompt,
    TokenCache,
};

use crate::common::write_client_secret;

/// Answers every prompt with a fixed code and remembers the URL it was shown
struct FixedCodePrompt {
    seen_urls: Mutex<Vec<String>>,
}

impl FixedCodePrompt {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen_urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl IAuthorizationPrompt for FixedCodePrompt {
    async fn authorization_code(&self, request: &AuthorizationRequest) -> anyhow::Result<String> {
        self.seen_urls.lock().unwrap().push(request.url.clone());
        Ok("the-code".to_string())
    }
}

fn token_response(access_token: &str, refresh_token: Option<&str>) -> ResponseTemplate {
    let mut body = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_valid_cached_credential_is_used_without_network() {
    let server = MockServer::start().await;
    let dir = tempfile::TempDir::new().unwrap();
    let secret = write_client_secret(dir.path(), &format!("{}/token", server.uri()));
    let cache_path = dir.path().join("credentials.json");

    let cached = Credential {
        access_token: "cached".to_string(),
        refresh_token: Some("r".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    };
    TokenCache::new(&cache_path).store(&cached).unwrap();

    Mock::given(method("POST"))
        .respond_with(token_response("unexpected", None))
        .expect(0)
        .mount(&server)
        .await;

    let authenticator = DriveAuthenticator::new(Arc::new(NonInteractivePrompt));
    let credential = authenticator
        .authenticate(&secret, &cache_path)
        .await
        .unwrap();
    assert_eq!(credential.access_token, "cached");
}

#[tokio::test]
async fn test_expired_credential_is_refreshed_and_cached() {
    let server = MockServer::start().await;
    let dir = tempfile::TempDir::new().unwrap();
    let secret = write_client_secret(dir.path(), &format!("{}/token", server.uri()));
    let cache_path = dir.path().join("credentials.json");

    TokenCache::new(&cache_path)
        .store(&Credential {
            access_token: "stale".to_string(),
            refresh_token: Some("keep-me".to_string()),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=keep-me"))
        .respond_with(token_response("fresh", None))
        .expect(1)
        .mount(&server)
        .await;

    let authenticator = DriveAuthenticator::new(Arc::new(NonInteractivePrompt));
    let credential = authenticator
        .authenticate(&secret, &cache_path)
        .await
        .unwrap();

    assert_eq!(credential.access_token, "fresh");
    assert_eq!(credential.refresh_token.as_deref(), Some("keep-me"));
    assert!(!credential.is_expired());

    let stored = TokenCache::new(&cache_path).load().unwrap().unwrap();
    assert_eq!(stored, credential);
}

#[tokio::test]
async fn test_missing_cache_prompts_and_stores_credential() {
    let server = MockServer::start().await;
    let dir = tempfile::TempDir::new().unwrap();
    let secret = write_client_secret(dir.path(), &format!("{}/token", server.uri()));
    let cache_path = dir.path().join("tokens/nested/credentials.json");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(token_response("first", Some("refresh-1")))
        .expect(1)
        .mount(&server)
        .await;

    let prompt = FixedCodePrompt::new();
    let authenticator = DriveAuthenticator::new(prompt.clone());
    let credential = authenticator
        .authenticate(&secret, &cache_path)
        .await
        .unwrap();

    assert_eq!(credential.access_token, "first");
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-1"));
    assert!(cache_path.exists());

    let urls = prompt.seen_urls.lock().unwrap();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("access_type=offline"));
    assert!(urls[0].contains("client_id=test-client.apps.googleusercontent.com"));
    assert!(urls[0].contains("redirect_uri=http%3A%2F%2Flocalhost"));
}

#[tokio::test]
async fn test_missing_cache_without_prompting_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let secret = write_client_secret(dir.path(), "http://127.0.0.1:9/token");
    let cache_path = dir.path().join("credentials.json");

    let authenticator = DriveAuthenticator::new(Arc::new(NonInteractivePrompt));
    let err = authenticator
        .authenticate(&secret, &cache_path)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("prompting is disabled"));
    assert!(!cache_path.exists());
}

#[tokio::test]
async fn test_missing_client_secret_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let authenticator = DriveAuthenticator::new(Arc::new(NonInteractivePrompt));
    let err = authenticator
        .authenticate(
            &dir.path().join("absent.json"),
            &dir.path().join("credentials.json"),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read client secret"));
}
