//! Shell completions generation command
//!
//! Generates shell completions for bash, zsh, fish, elvish, and powershell.
//! Usage: `zmsync completions bash > ~/.local/share/bash-completion/completions/zmsync`

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use super::{CommandContext, EXIT_SUCCESS};

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    /// Execute the completions command, printing completions to stdout
    pub async fn execute(&self, _ctx: &CommandContext) -> Result<u8> {
        let mut cmd = crate::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "zmsync", &mut io::stdout());
        Ok(EXIT_SUCCESS)
    }
}
