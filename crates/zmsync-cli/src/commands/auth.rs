//! Auth commands - Login, Logout, and Status for Google Drive authorization
//!
//! Provides the `zmsync auth` CLI subcommands which:
//! 1. `login`  - Runs the OAuth2 flow and writes the token cache, without syncing.
//! 2. `logout` - Deletes the token cache.
//! 3. `status` - Shows whether a cached credential exists and when it expires.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use tracing::info;

use zmsync_core::config::Config;
use zmsync_core::ports::CREDENTIAL_FILE_NAME;
use zmsync_drive::auth::{DriveAuthenticator, TerminalPrompt, TokenCache};

use super::sync::select_prompt;
use super::{expand_tilde, CommandContext, EXIT_SUCCESS};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Token location shared by the auth subcommands
#[derive(Debug, Args)]
pub struct TokenDirArg {
    /// Directory holding the cached credential
    #[arg(long)]
    pub token_dir: Option<PathBuf>,
}

impl TokenDirArg {
    fn cache(&self, config: &Config) -> TokenCache {
        let dir = self
            .token_dir
            .clone()
            .unwrap_or_else(|| config.auth.token_dir.clone());
        TokenCache::new(expand_tilde(&dir).join(CREDENTIAL_FILE_NAME))
    }
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize access to Google Drive and cache the credential
    Login {
        /// OAuth client-secret JSON file
        #[arg(long)]
        client_secret: Option<PathBuf>,

        /// Paste the code into the terminal instead of using the browser callback
        #[arg(long)]
        manual: bool,

        #[command(flatten)]
        token_dir: TokenDirArg,
    },
    /// Remove the cached credential
    Logout {
        #[command(flatten)]
        token_dir: TokenDirArg,
    },
    /// Check authorization status
    Status {
        #[command(flatten)]
        token_dir: TokenDirArg,
    },
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<u8> {
        let fmt = get_formatter(ctx.format, ctx.quiet);
        match self {
            AuthCommand::Login {
                client_secret,
                manual,
                token_dir,
            } => {
                self.execute_login(client_secret.clone(), *manual, token_dir, ctx, &*fmt)
                    .await
            }
            AuthCommand::Logout { token_dir } => self.execute_logout(token_dir, ctx, &*fmt),
            AuthCommand::Status { token_dir } => self.execute_status(token_dir, ctx, &*fmt),
        }
    }

    /// Runs the interactive flow even if a valid credential is cached
    async fn execute_login(
        &self,
        client_secret: Option<PathBuf>,
        manual: bool,
        token_dir: &TokenDirArg,
        ctx: &CommandContext,
        fmt: &dyn OutputFormatter,
    ) -> Result<u8> {
        let secret = client_secret
            .or_else(|| ctx.config.auth.client_secret.clone())
            .map(|path| expand_tilde(&path))
            .context(
                "No client secret; pass --client-secret or set auth.client_secret in the config file",
            )?;
        let cache = token_dir.cache(&ctx.config);

        let authenticator = if manual {
            DriveAuthenticator::new(Arc::new(TerminalPrompt))
        } else {
            DriveAuthenticator::new(select_prompt(true, &secret))
        };

        info!(secret = %secret.display(), cache = %cache.path().display(), "Starting authorization");
        let credential = authenticator
            .login(&secret, cache.path())
            .await
            .context("Authorization failed")?;

        fmt.success(&format!(
            "Authorized; credential stored in {}",
            cache.path().display()
        ));
        fmt.info(&format!(
            "Access token expires at {}",
            credential.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        Ok(EXIT_SUCCESS)
    }

    fn execute_logout(
        &self,
        token_dir: &TokenDirArg,
        ctx: &CommandContext,
        fmt: &dyn OutputFormatter,
    ) -> Result<u8> {
        let cache = token_dir.cache(&ctx.config);
        if cache.clear()? {
            fmt.success(&format!("Removed {}", cache.path().display()));
        } else {
            fmt.info("No cached credential. Nothing to remove.");
        }
        Ok(EXIT_SUCCESS)
    }

    fn execute_status(
        &self,
        token_dir: &TokenDirArg,
        ctx: &CommandContext,
        fmt: &dyn OutputFormatter,
    ) -> Result<u8> {
        let cache = token_dir.cache(&ctx.config);
        let credential = cache.load()?;

        if ctx.format == OutputFormat::Json {
            let json = match &credential {
                Some(credential) => serde_json::json!({
                    "authorized": true,
                    "token_cache": cache.path(),
                    "expires_at": credential.expires_at.to_rfc3339(),
                    "expired": credential.is_expired(),
                    "refreshable": credential.refresh_token.is_some(),
                }),
                None => serde_json::json!({
                    "authorized": false,
                    "token_cache": cache.path(),
                }),
            };
            fmt.print_json(&json);
            return Ok(EXIT_SUCCESS);
        }

        let Some(credential) = credential else {
            fmt.info("Authorization status: Not authorized");
            fmt.info("Run 'zmsync auth login' to authorize");
            return Ok(EXIT_SUCCESS);
        };

        let remaining = credential.expires_at - Utc::now();
        let token_status = if credential.is_expired() {
            "Expired".to_string()
        } else {
            format!("Valid for {} min", remaining.num_minutes())
        };

        fmt.success("Authorized");
        fmt.info(&format!("Token cache:   {}", cache.path().display()));
        fmt.info(&format!("Token status:  {}", token_status));
        fmt.info(&format!(
            "Expires at:    {}",
            credential.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        fmt.info(&format!(
            "Refreshable:   {}",
            if credential.refresh_token.is_some() { "yes" } else { "no" }
        ));
        Ok(EXIT_SUCCESS)
    }
}
