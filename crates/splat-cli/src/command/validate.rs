use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_COMMAND;

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct ValidateArgs {
    /// Splat file to check.
    pub path: PathBuf,
}

/// Validates a splat file and prints its summary as JSON.
pub async fn run(args: &ValidateArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let header = splat_ply::validate(&bytes)
        .with_context(|| format!("{} is not a valid splat", args.path.display()))?;
    let metadata = splat_ply::summarize(&bytes)
        .with_context(|| format!("{} carries no readable metadata", args.path.display()))?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        path = %args.path.display(),
        header_bytes = header.header_len,
        point_count = metadata.point_count,
        "Splat is valid"
    );

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
