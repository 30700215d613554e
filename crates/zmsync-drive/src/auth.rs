//! OAuth2 authentication for Google Drive
//!
//! Implements the installed-application Authorization Code flow (with PKCE)
//! against Google's identity platform, plus a file-based credential cache so
//! that only the first run needs a human in the loop.
//!
//! ## Components
//!
//! - [`ClientCredentials`] - The OAuth client registration read from a client-secret file
//! - [`TokenCache`] - JSON credential file next to the rest of the user's config
//! - [`OAuthFlow`] - Authorization URL generation, code exchange, refresh
//! - [`IAuthorizationPrompt`] - How the user is asked for an authorization code
//!   ([`TerminalPrompt`], [`LoopbackPrompt`], [`NonInteractivePrompt`])
//! - [`DriveAuthenticator`] - Cache, refresh, then prompt

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use zmsync_core::ports::Credential;

use crate::DriveError;

/// Google's OAuth2 authorization endpoint, used when the secret omits `auth_uri`
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's OAuth2 token endpoint, used when the secret omits `token_uri`
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Full Drive access; folder lookup needs to see folders the app did not create
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Default port for [`LoopbackPrompt`]
pub const DEFAULT_LOOPBACK_PORT: u16 = 8400;

/// Cached credentials this close to expiry are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

// ============================================================================
// ClientCredentials
// ============================================================================

/// An OAuth client registration
///
/// Parsed from the JSON file the Google Cloud console hands out, which nests
/// everything under `installed` (desktop apps) or `web`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientCredentials>,
    web: Option<ClientCredentials>,
}

impl ClientCredentials {
    /// Parses client-secret JSON
    pub fn from_json(json: &str) -> Result<Self, DriveError> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| DriveError::InvalidClientSecret(e.to_string()))?;

        let credentials = file.installed.or(file.web).ok_or_else(|| {
            DriveError::InvalidClientSecret("expected an 'installed' or 'web' section".to_string())
        })?;

        if credentials.client_id.trim().is_empty() {
            return Err(DriveError::InvalidClientSecret(
                "client_id is empty".to_string(),
            ));
        }

        Ok(credentials)
    }

    /// Reads and parses a client-secret file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client secret {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to parse client secret {}", path.display()))
    }

    /// The first registered redirect URI that points at this machine
    pub fn loopback_redirect(&self) -> Option<&str> {
        self.redirect_uris
            .iter()
            .map(String::as_str)
            .find(|uri| uri.starts_with("http://127.0.0.1") || uri.starts_with("http://localhost"))
    }
}

// ============================================================================
// TokenCache
// ============================================================================

/// A credential persisted as JSON at a fixed path
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached credential, `None` if there is no cache file
    ///
    /// A cache file that no longer parses is treated as absent so the user
    /// is simply asked to authorize again.
    pub fn load(&self) -> Result<Option<Credential>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cached credential");
                return Ok(None);
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read token cache {}", self.path.display())))
            }
        };

        match serde_json::from_str(&json) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    /// Writes the credential, creating the containing directory if needed
    pub fn store(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create token directory {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(credential).context("Failed to serialize credential")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write token cache {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", self.path.display()))?;
        }

        info!(path = %self.path.display(), "Token stored");
        Ok(())
    }

    /// Deletes the cache file; returns false if there was none
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to delete token cache {}", self.path.display()))),
        }
    }
}

// ============================================================================
// OAuthFlow
// ============================================================================

/// An authorization URL along with the state needed to finish the exchange
pub struct AuthorizationRequest {
    /// URL the user must visit
    pub url: String,
    /// Redirect URI embedded in `url`
    pub redirect_uri: String,
    /// CSRF state the callback must echo back
    pub csrf_state: String,
    pkce_verifier: PkceCodeVerifier,
}

/// OAuth2 flow for a single client registration, using the `oauth2` crate
pub struct OAuthFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http: reqwest::Client,
    scopes: Vec<String>,
}

impl OAuthFlow {
    pub fn new(credentials: &ClientCredentials) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(credentials.auth_uri.clone()).context("Invalid authorization URL")?,
            )
            .set_token_uri(
                TokenUrl::new(credentials.token_uri.clone()).context("Invalid token URL")?,
            );

        // Token endpoints must not be followed through redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            http,
            scopes: vec![DRIVE_SCOPE.to_string()],
        })
    }

    /// Builds an authorization URL asking for offline access
    pub fn authorization_request(&self, redirect_uri: &str) -> Result<AuthorizationRequest> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let redirect = RedirectUrl::new(redirect_uri.to_string()).context("Invalid redirect URI")?;

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(std::borrow::Cow::Owned(redirect))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, csrf_token) = request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        Ok(AuthorizationRequest {
            url: url.to_string(),
            redirect_uri: redirect_uri.to_string(),
            csrf_state: csrf_token.secret().to_string(),
            pkce_verifier,
        })
    }

    /// Exchanges an authorization code for a credential
    pub async fn exchange_code(
        &self,
        code: String,
        request: AuthorizationRequest,
    ) -> Result<Credential> {
        info!("Exchanging authorization code for tokens");

        let redirect = RedirectUrl::new(request.redirect_uri).context("Invalid redirect URI")?;
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_redirect_uri(std::borrow::Cow::Owned(redirect))
            .set_pkce_verifier(request.pkce_verifier)
            .request_async(&self.http)
            .await
            .context("Failed to exchange authorization code")?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(Credential {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().to_string()),
            expires_at,
        })
    }

    /// Obtains a fresh access token; keeps `refresh_token` if none is returned
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(Credential {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        })
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Obtains an authorization code from the user
#[async_trait::async_trait]
pub trait IAuthorizationPrompt: Send + Sync {
    /// Redirect URI this prompt receives codes on
    ///
    /// `None` means the first URI registered in the client secret.
    fn redirect_uri(&self) -> Option<String> {
        None
    }

    /// Shows `request.url` to the user and returns the authorization code
    async fn authorization_code(&self, request: &AuthorizationRequest) -> Result<String>;
}

/// Writes the authorization URL for the user
///
/// Prompts go to stderr; stdout is reserved for command output such as
/// `--json` reports.
fn show_authorization_url(out: &mut dyn Write, url: &str) -> std::io::Result<()> {
    writeln!(out, "Authorize this app by visiting this url: {url}")?;
    out.flush()
}

/// Prints the URL and reads the code from standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait::async_trait]
impl IAuthorizationPrompt for TerminalPrompt {
    async fn authorization_code(&self, request: &AuthorizationRequest) -> Result<String> {
        show_authorization_url(&mut std::io::stderr(), &request.url)?;

        let line = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            write!(stderr, "Enter the code from that page here: ")?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .context("Prompt task failed")?
        .context("Failed to read authorization code")?;

        parse_pasted_code(&line)
            .ok_or_else(|| anyhow::anyhow!("No authorization code was entered"))
    }
}

/// Accepts either the bare code or the whole redirected URL
fn parse_pasted_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains("code=") {
        if let Ok(url) = url::Url::parse(input) {
            return url
                .query_pairs()
                .find(|(key, _)| key == "code")
                .map(|(_, value)| value.into_owned());
        }
    }

    Some(input.to_string())
}

/// Opens the browser and receives the redirect on a local HTTP server
#[derive(Debug, Clone, Copy)]
pub struct LoopbackPrompt {
    port: u16,
}

impl Default for LoopbackPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_LOOPBACK_PORT)
    }
}

impl LoopbackPrompt {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait::async_trait]
impl IAuthorizationPrompt for LoopbackPrompt {
    fn redirect_uri(&self) -> Option<String> {
        Some(format!("http://127.0.0.1:{}", self.port))
    }

    async fn authorization_code(&self, request: &AuthorizationRequest) -> Result<String> {
        show_authorization_url(&mut std::io::stderr(), &request.url)?;
        if let Err(e) = webbrowser::open(&request.url) {
            warn!(error = %e, "Could not open a browser; visit the URL manually");
        }

        let callback = LocalCallbackServer::new(self.port).receive().await?;
        if callback.state != request.csrf_state {
            bail!("Authorization callback carried an unexpected state parameter");
        }
        Ok(callback.code)
    }
}

/// Refuses to prompt; used for unattended runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompt;

#[async_trait::async_trait]
impl IAuthorizationPrompt for NonInteractivePrompt {
    async fn authorization_code(&self, _request: &AuthorizationRequest) -> Result<String> {
        bail!("Authorization required but prompting is disabled; run 'zmsync auth login' first")
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server that receives one OAuth2 redirect on `127.0.0.1`
pub struct LocalCallbackServer {
    port: u16,
}

/// Parameters extracted from the OAuth2 callback
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl LocalCallbackServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Waits for the browser to be redirected back with a code
    ///
    /// Requests without a code (favicon fetches and the like) get an error
    /// page and the server keeps waiting.
    pub async fn receive(&self) -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{header, Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::mpsc;

        let address = format!("127.0.0.1:{}", self.port);
        info!(%address, "Waiting for OAuth callback");

        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind callback server to {address}"))?;

        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);

        loop {
            let (stream, _) = tokio::select! {
                Some(params) = rx.recv() => {
                    info!("Received OAuth callback with authorization code");
                    return Ok(params);
                }
                accepted = listener.accept() => {
                    accepted.context("Failed to accept connection on callback server")?
                }
            };

            let tx = tx.clone();
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = tx.clone();
                async move {
                    let uri = req.uri().to_string();
                    debug!(%uri, "Callback server received request");

                    let (status, html) = match parse_callback_params(&uri) {
                        Some(params) => {
                            let _ = tx.send(params).await;
                            (StatusCode::OK, success_html())
                        }
                        None => (
                            StatusCode::BAD_REQUEST,
                            error_html("Missing authorization code in callback"),
                        ),
                    };

                    let mut response = Response::new(Full::new(Bytes::from(html)));
                    *response.status_mut() = status;
                    response.headers_mut().insert(
                        header::CONTENT_TYPE,
                        header::HeaderValue::from_static("text/html; charset=utf-8"),
                    );
                    Ok::<_, hyper::Error>(response)
                }
            });

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(error = %e, "Callback server connection error");
                }
            });
        }
    }
}

/// Parses the authorization code and state from a callback request target
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>zmsync - Authorization complete</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization complete</h1>
    <p>zmsync can now upload to your Google Drive. You can close this window.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>zmsync - Authorization error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization error</h1>
    <p>{message}</p>
</body>
</html>"#
    )
}

// ============================================================================
// DriveAuthenticator
// ============================================================================

/// Produces a usable credential from a client secret and a token cache
///
/// 1. A cached credential that is not about to expire is used as-is.
/// 2. Otherwise its refresh token is exchanged and the cache rewritten.
/// 3. Otherwise the prompt is asked for an authorization code.
#[derive(Clone)]
pub struct DriveAuthenticator {
    prompt: Arc<dyn IAuthorizationPrompt>,
}

impl DriveAuthenticator {
    pub fn new(prompt: Arc<dyn IAuthorizationPrompt>) -> Self {
        Self { prompt }
    }

    #[instrument(skip_all, fields(secret = %secret_path.display(), cache = %token_cache.display()))]
    pub async fn authenticate(&self, secret_path: &Path, token_cache: &Path) -> Result<Credential> {
        let credentials = ClientCredentials::load(secret_path)?;
        let cache = TokenCache::new(token_cache);

        if let Some(cached) = cache.load()? {
            if !cached.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES)) {
                debug!("Using cached credential");
                return Ok(cached);
            }

            if let Some(refresh_token) = cached.refresh_token.as_deref() {
                match OAuthFlow::new(&credentials)?.refresh(refresh_token).await {
                    Ok(credential) => {
                        cache.store(&credential)?;
                        return Ok(credential);
                    }
                    Err(e) => warn!(error = %format!("{e:#}"), "Refresh failed, re-authorizing"),
                }
            }
        }

        self.authorize(&credentials, &cache).await
    }

    /// Runs the interactive flow regardless of what is cached
    pub async fn login(&self, secret_path: &Path, token_cache: &Path) -> Result<Credential> {
        let credentials = ClientCredentials::load(secret_path)?;
        self.authorize(&credentials, &TokenCache::new(token_cache))
            .await
    }

    async fn authorize(
        &self,
        credentials: &ClientCredentials,
        cache: &TokenCache,
    ) -> Result<Credential> {
        let redirect_uri = self
            .prompt
            .redirect_uri()
            .or_else(|| credentials.redirect_uris.first().cloned())
            .ok_or_else(|| {
                DriveError::InvalidClientSecret("no redirect_uris registered".to_string())
            })?;

        let flow = OAuthFlow::new(credentials)?;
        let request = flow.authorization_request(&redirect_uri)?;
        let code = self.prompt.authorization_code(&request).await?;
        let credential = flow.exchange_code(code, request).await?;

        cache.store(&credential)?;
        info!("Authorization completed");
        Ok(credential)
    }
}
