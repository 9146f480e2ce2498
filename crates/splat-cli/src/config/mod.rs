//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── store: ArtifactStoreConfig  # Artifact directory, TTLs, size limits
//! ├── backend: BackendConfig      # Inference endpoint, timeout, mock
//! ├── jobs: JobManagerConfig      # Job TTL
//! └── command: Command            # generate | validate | sweep
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

use std::process;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use splat_inference::BackendConfig;
use splat_store::ArtifactStoreConfig;
use splat_worker::JobManagerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::command::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "splat")]
#[command(about = "Generate and inspect Gaussian splats")]
#[command(version)]
pub struct Cli {
    /// Artifact storage configuration.
    #[clap(flatten)]
    pub store: ArtifactStoreConfig,

    /// Inference backend configuration.
    #[clap(flatten)]
    pub backend: BackendConfig,

    /// Generation job configuration.
    #[clap(flatten)]
    pub jobs: JobManagerConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so clap's `env` lookups can see it.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    ///
    /// Logs go to stderr so command output on stdout stays machine-readable.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Job configuration with the backend deadline resolved.
    pub fn job_config(&self) -> JobManagerConfig {
        self.jobs
            .clone()
            .with_backend_timeout(self.backend.timeout())
    }

    /// Validates all configuration values.
    ///
    /// The backend is only checked for commands that call it.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.store
            .validate()
            .context("invalid artifact store configuration")?;

        if self.command.needs_backend() {
            self.backend
                .validate()
                .context("invalid inference backend configuration")?;
        }
        Ok(())
    }

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            directory = %self.store.directory.display(),
            ttl_secs = self.store.effective_ttl().as_secs(),
            sweep_interval_secs = self.store.effective_sweep_interval().as_secs(),
            max_image_bytes = self.store.max_image_bytes,
            max_point_cloud_bytes = self.store.max_point_cloud_bytes,
            "Artifact store configuration"
        );

        if self.command.needs_backend() {
            tracing::debug!(
                target: TRACING_TARGET_CONFIG,
                endpoint = ?self.backend.endpoint_url.as_ref().map(|url| url.as_str()),
                timeout_ms = self.backend.timeout().as_millis(),
                allow_mock = self.backend.allow_mock,
                default_tier = %self.backend.default_tier,
                job_ttl_secs = self.jobs.effective_job_ttl().as_secs(),
                "Generation configuration"
            );
        }
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
