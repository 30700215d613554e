//! CLI subcommands and the state they share

use std::path::{Path, PathBuf};

use zmsync_core::config::Config;

use crate::output::OutputFormat;

pub mod auth;
pub mod completions;
pub mod sync;

/// Process exit status: success, nothing to do, or dry run
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit status: the run was aborted
pub const EXIT_FATAL: u8 = 1;
/// Process exit status: the run finished but some archives or uploads failed
pub const EXIT_PARTIAL: u8 = 2;

/// Everything a command needs besides its own arguments
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config: Config,
}

/// Expands a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
