use anyhow::Context;
use splat_store::ArtifactStore;

use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;

/// Reconciles the artifact directory, sweeps expired artifacts once and
/// prints the number removed.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let store = ArtifactStore::new(cli.store.clone());
    store
        .initialize()
        .await
        .context("failed to open artifact store")?;

    let swept = store.sweep_expired().await;
    store.shutdown().await;
    let removed = swept.context("failed to sweep expired artifacts")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        removed,
        remaining = store.len().await,
        "Sweep finished"
    );

    println!("{removed}");
    Ok(())
}
