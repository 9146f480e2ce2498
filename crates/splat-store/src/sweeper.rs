//! Periodic background sweep of expired artifacts.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::store::{ArtifactStore, ArtifactStoreInner};

/// Tracing target for the background sweeper.
const TRACING_TARGET: &str = "splat_store::sweeper";

/// Handle to a running sweep task.
///
/// The task holds only a weak reference to the store, so dropping every
/// [`ArtifactStore`] handle also ends the task at its next tick.
#[derive(Debug)]
pub(crate) struct Sweeper {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep loop onto the current runtime.
    pub fn spawn(store: Weak<ArtifactStoreInner>, interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run(store, interval, cancel_token.clone()));
        Self {
            cancel_token,
            handle,
        }
    }

    /// Cancels the loop and waits for the current sweep to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            tracing::warn!(target: TRACING_TARGET, error = %err, "Sweep task ended abnormally");
        }
    }
}

async fn run(store: Weak<ArtifactStoreInner>, interval: Duration, cancel_token: CancellationToken) {
    tracing::debug!(
        target: TRACING_TARGET,
        interval_ms = interval.as_millis() as u64,
        "Starting artifact sweeper"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => {
                tracing::debug!(target: TRACING_TARGET, "Shutdown requested, stopping sweeper");
                break;
            }

            _ = ticker.tick() => {
                let Some(inner) = store.upgrade() else {
                    tracing::debug!(target: TRACING_TARGET, "Store dropped, stopping sweeper");
                    break;
                };

                let store = ArtifactStore::from_inner(inner);
                match store.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(target: TRACING_TARGET, removed, "Swept expired artifacts");
                    }
                    Err(err) => {
                        tracing::warn!(target: TRACING_TARGET, error = %err, "Artifact sweep failed");
                    }
                }
            }
        }
    }
}
