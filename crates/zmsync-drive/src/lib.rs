//! zmsync Drive - Google Drive adapter
//!
//! Provides async client for:
//! - OAuth2 authentication (installed-app flow with PKCE) and a file-based
//!   credential cache
//! - Folder lookup/creation and paginated listings via the Drive v3 API
//! - Multipart uploads
//!
//! ## Modules
//!
//! - [`auth`] - Client secret parsing, OAuth2 flow, token cache, authorization prompts
//! - [`client`] - Drive v3 HTTP client
//! - [`upload`] - Multipart file uploads
//! - [`provider`] - [`IRemoteStore`](zmsync_core::ports::IRemoteStore) implementation

pub mod auth;
pub mod client;
pub mod provider;
pub mod upload;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use zmsync_core::ports::ErrorClass;

/// Errors that can occur when communicating with Google Drive
#[derive(Debug, Error)]
pub enum DriveError {
    /// Authentication credentials are invalid, expired, or lack permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Too many requests (429)")]
    TooManyRequests {
        /// Server-suggested wait, if it sent one
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The OAuth client-secret file is missing fields or malformed
    #[error("Invalid client secret: {0}")]
    InvalidClientSecret(String),
}

impl DriveError {
    /// Classifies a non-success HTTP response
    ///
    /// Drive reports per-user quota exhaustion as `403` with a
    /// `rateLimitExceeded`/`userRateLimitExceeded` reason; those count as
    /// rate limiting rather than a permission problem.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Self {
        let message = summarize_body(body);
        match status.as_u16() {
            401 => DriveError::Unauthorized(message),
            403 if body.contains("ateLimitExceeded") => DriveError::TooManyRequests { retry_after },
            403 => DriveError::Unauthorized(message),
            404 => DriveError::NotFound(message),
            429 => DriveError::TooManyRequests { retry_after },
            code @ 500..=599 => DriveError::ServerError {
                status: code,
                message,
            },
            code => DriveError::InvalidResponse(format!("unexpected status {code}: {message}")),
        }
    }

    /// Whether the failed request is worth repeating
    pub fn class(&self) -> ErrorClass {
        match self {
            DriveError::TooManyRequests { retry_after } => ErrorClass::Transient {
                retry_after: *retry_after,
            },
            DriveError::ServerError { .. } | DriveError::NetworkError(_) => ErrorClass::TRANSIENT,
            DriveError::Unauthorized(_)
            | DriveError::NotFound(_)
            | DriveError::InvalidResponse(_)
            | DriveError::InvalidClientSecret(_) => ErrorClass::Permanent,
        }
    }
}

/// Extracts `error.message` from a Drive error body, or trims the raw body
fn summarize_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            DriveError::from_status(StatusCode::UNAUTHORIZED, None, ""),
            DriveError::Unauthorized(_)
        ));
        assert!(matches!(
            DriveError::from_status(StatusCode::NOT_FOUND, None, ""),
            DriveError::NotFound(_)
        ));
        assert!(matches!(
            DriveError::from_status(StatusCode::TOO_MANY_REQUESTS, None, ""),
            DriveError::TooManyRequests { .. }
        ));
        assert!(matches!(
            DriveError::from_status(StatusCode::BAD_GATEWAY, None, "bad gateway"),
            DriveError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            DriveError::from_status(StatusCode::BAD_REQUEST, None, ""),
            DriveError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_403_rate_limit_is_too_many_requests() {
        let body = r#"{"error":{"errors":[{"reason":"userRateLimitExceeded"}],"code":403,"message":"User Rate Limit Exceeded"}}"#;
        assert!(matches!(
            DriveError::from_status(StatusCode::FORBIDDEN, None, body),
            DriveError::TooManyRequests { .. }
        ));

        let denied = r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#;
        let err = DriveError::from_status(StatusCode::FORBIDDEN, None, denied);
        assert_eq!(err.to_string(), "Unauthorized: Insufficient Permission");
    }

    #[test]
    fn test_display_text() {
        let err = DriveError::ServerError {
            status: 503,
            message: "Backend Error".to_string(),
        };
        assert_eq!(err.to_string(), "Server error (503): Backend Error");

        let err = DriveError::TooManyRequests { retry_after: None };
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_class() {
        let wait = Duration::from_secs(7);
        assert_eq!(
            DriveError::TooManyRequests {
                retry_after: Some(wait)
            }
            .class(),
            ErrorClass::Transient {
                retry_after: Some(wait)
            }
        );
        assert_eq!(
            DriveError::from_status(StatusCode::SERVICE_UNAVAILABLE, None, "").class(),
            ErrorClass::TRANSIENT
        );
        assert_eq!(
            DriveError::NotFound("File not found: 1aB5004xYz.".to_string()).class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            DriveError::Unauthorized("Invalid Credentials".to_string()).class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_summarize_body_falls_back_to_text() {
        assert_eq!(summarize_body("  plain failure \n"), "plain failure");
        assert_eq!(
            summarize_body(r#"{"error":{"message":"File not found: abc"}}"#),
            "File not found: abc"
        );
    }
}
