//! Subcommands of the `splat` binary.

mod generate;
mod sweep;
mod validate;

use clap::Subcommand;
pub use generate::GenerateArgs;
use serde::{Deserialize, Serialize};
pub use validate::ValidateArgs;

use crate::config::Cli;

/// What the binary does once configured.
#[derive(Debug, Clone, Subcommand, Serialize, Deserialize)]
pub enum Command {
    /// Turn a source image into a splat.
    Generate(GenerateArgs),
    /// Check a splat file and print its metadata.
    Validate(ValidateArgs),
    /// Remove expired artifacts and report how many were removed.
    Sweep,
}

impl Command {
    /// Returns `true` if the command calls the inference backend.
    pub fn needs_backend(&self) -> bool {
        matches!(self, Self::Generate(_))
    }

    /// Runs the command.
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match self {
            Self::Generate(args) => generate::run(cli, args).await,
            Self::Validate(args) => validate::run(args).await,
            Self::Sweep => sweep::run(cli).await,
        }
    }
}
