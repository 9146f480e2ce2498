#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;
mod signal;

use std::process;

use anyhow::Context;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "splat_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "splat_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "splat_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "splat_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "Command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();
    cli.log();
    cli.validate().context("invalid configuration")?;

    cli.command.run(&cli).await
}
