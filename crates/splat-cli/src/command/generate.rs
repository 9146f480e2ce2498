use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use serde::{Deserialize, Serialize};
use splat_core::ArtifactId;
use splat_inference::GpuTier;
use splat_store::{ArtifactStore, stem_of};
use splat_worker::{GenerationJob, JobManager, JobStatus};

use crate::TRACING_TARGET_COMMAND;
use crate::config::Cli;
use crate::signal::shutdown_signal;

/// Interval between job status checks.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Extra time allowed past the backend deadline for storing the result.
const WAIT_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct GenerateArgs {
    /// Source image.
    #[arg(long)]
    pub image: PathBuf,

    /// Where to write the splat. Defaults to `<image stem>.ply` next to the
    /// image.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// GPU tier to run on. Defaults to the backend's default tier.
    #[arg(long)]
    pub tier: Option<GpuTier>,

    /// Display name recorded on the generated artifact.
    #[arg(long)]
    pub display_name: Option<String>,
}

impl GenerateArgs {
    /// Output path, `<image stem>.ply` beside the image unless overridden.
    pub fn output_path(&self) -> PathBuf {
        if let Some(out) = &self.out {
            return out.clone();
        }

        let file_name = self
            .image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.image
            .with_file_name(format!("{}.ply", stem_of(&file_name)))
    }
}

/// Uploads the image, runs one generation job and writes the splat.
pub async fn run(cli: &Cli, args: &GenerateArgs) -> anyhow::Result<()> {
    let store = ArtifactStore::new(cli.store.clone());
    store
        .initialize()
        .await
        .context("failed to open artifact store")?;

    let result = generate(cli, args, &store).await;
    store.shutdown().await;
    result
}

async fn generate(cli: &Cli, args: &GenerateArgs, store: &ArtifactStore) -> anyhow::Result<()> {
    let backend = cli
        .backend
        .clone()
        .into_backend()
        .context("failed to create inference backend")?;
    let config = cli.job_config();
    let max_wait = config.effective_backend_timeout() + WAIT_MARGIN;
    let manager = JobManager::new(store.clone(), backend, config);

    let image = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let file_name = args
        .image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source = store
        .ingest(&image, &file_name, "")
        .await
        .context("failed to store source image")?;
    let job_id = manager
        .start(source.id, args.display_name.clone(), args.tier)
        .await
        .context("failed to start generation")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        job_id = %job_id,
        source_artifact_id = %source.id,
        "Waiting for generation"
    );

    let job = tokio::select! {
        job = manager.wait_for_terminal(job_id, POLL_INTERVAL, max_wait) => job?,
        () = shutdown_signal() => bail!("interrupted while waiting for job {job_id}"),
    };

    let output_id = finished(&job)?;

    let bytes = store
        .read_bytes(output_id)
        .await
        .context("failed to read generated splat")?;
    let out = args.output_path();
    tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        job_id = %job_id,
        output_artifact_id = %output_id,
        path = %out.display(),
        size_bytes = bytes.len(),
        "Splat written"
    );

    let report = serde_json::json!({
        "job": job,
        "outputPath": out,
        "outputUrl": store.public_url(output_id),
        "metadata": splat_ply::summarize(&bytes),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn finished(job: &GenerationJob) -> anyhow::Result<ArtifactId> {
    match (job.status, job.output_artifact_id) {
        (JobStatus::Succeeded, Some(output_id)) => Ok(output_id),
        _ => bail!(
            "generation failed: {}",
            job.error_message.as_deref().unwrap_or("no output produced")
        ),
    }
}
