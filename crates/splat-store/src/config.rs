//! Artifact store configuration.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StoreError};
use crate::media::MediaCategory;

/// Default artifact lifetime: 24 hours.
pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between background sweeps: 5 minutes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default upload limit for source images: 25 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;

/// Default upload limit for point cloud payloads: 512 MiB.
pub const DEFAULT_MAX_POINT_CLOUD_BYTES: u64 = 512 * 1024 * 1024;

/// Default base URL artifacts are published under.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:3000";

/// Default artifact directory.
pub const DEFAULT_ARTIFACT_DIR: &str = "./data/artifacts";

/// Configuration for [`ArtifactStore`](crate::ArtifactStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ArtifactStoreConfig {
    /// Directory holding data files and sidecar records.
    #[cfg_attr(
        feature = "config",
        arg(long = "artifact-dir", env = "ARTIFACT_DIR", default_value = DEFAULT_ARTIFACT_DIR)
    )]
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Lifetime of newly created artifacts. Zero selects the default.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "artifact-ttl-secs",
            env = "ARTIFACT_TTL_SECS",
            default_value = "86400",
            value_parser = splat_core::time::parse_secs
        )
    )]
    #[serde(default = "default_ttl")]
    pub ttl: Duration,

    /// Interval between background sweeps. Zero selects the default.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "artifact-sweep-interval-secs",
            env = "ARTIFACT_SWEEP_INTERVAL_SECS",
            default_value = "300",
            value_parser = splat_core::time::parse_secs
        )
    )]
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,

    /// Base URL used by [`ArtifactStore::public_url`](crate::ArtifactStore::public_url).
    #[cfg_attr(
        feature = "config",
        arg(
            long = "artifact-public-base-url",
            env = "ARTIFACT_PUBLIC_BASE_URL",
            default_value = DEFAULT_PUBLIC_BASE_URL
        )
    )]
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Largest accepted image upload in bytes.
    #[cfg_attr(
        feature = "config",
        arg(long = "max-image-bytes", env = "MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)
    )]
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Largest accepted point cloud upload in bytes.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "max-point-cloud-bytes",
            env = "MAX_POINT_CLOUD_BYTES",
            default_value_t = DEFAULT_MAX_POINT_CLOUD_BYTES
        )
    )]
    #[serde(default = "default_max_point_cloud_bytes")]
    pub max_point_cloud_bytes: u64,
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

fn default_ttl() -> Duration {
    DEFAULT_ARTIFACT_TTL
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_owned()
}

fn default_max_image_bytes() -> u64 {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_max_point_cloud_bytes() -> u64 {
    DEFAULT_MAX_POINT_CLOUD_BYTES
}

impl ArtifactStoreConfig {
    /// Creates a configuration rooted at `directory` with default limits.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            public_base_url: default_public_base_url(),
            max_image_bytes: default_max_image_bytes(),
            max_point_cloud_bytes: default_max_point_cloud_bytes(),
        }
    }

    /// Sets the artifact lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the public base URL.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = base_url.into();
        self
    }

    /// Sets the per-category upload limits.
    pub fn with_limits(mut self, max_image_bytes: u64, max_point_cloud_bytes: u64) -> Self {
        self.max_image_bytes = max_image_bytes;
        self.max_point_cloud_bytes = max_point_cloud_bytes;
        self
    }

    /// Returns the lifetime, using the default if zero.
    pub fn effective_ttl(&self) -> Duration {
        if self.ttl.is_zero() {
            DEFAULT_ARTIFACT_TTL
        } else {
            self.ttl
        }
    }

    /// Returns the sweep interval, using the default if zero.
    pub fn effective_sweep_interval(&self) -> Duration {
        if self.sweep_interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            self.sweep_interval
        }
    }

    /// Upload limit for a media category.
    pub fn max_bytes_for(&self, category: MediaCategory) -> u64 {
        match category {
            MediaCategory::Image => self.max_image_bytes,
            MediaCategory::PointCloud => self.max_point_cloud_bytes,
        }
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the directory is empty, the
    /// public base URL does not parse, or an upload limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(StoreError::configuration(
                "artifact directory must not be empty",
            ));
        }

        Url::parse(&self.public_base_url).map_err(|err| {
            StoreError::configuration(format!(
                "public base URL '{}' is invalid: {err}",
                self.public_base_url
            ))
        })?;

        if self.max_image_bytes == 0 || self.max_point_cloud_bytes == 0 {
            return Err(StoreError::configuration(
                "upload limits must be greater than zero",
            ));
        }

        Ok(())
    }
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self::new(default_directory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArtifactStoreConfig::default();
        assert_eq!(config.directory, PathBuf::from("./data/artifacts"));
        assert_eq!(config.effective_ttl(), DEFAULT_ARTIFACT_TTL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_fall_back() {
        let config = ArtifactStoreConfig::default()
            .with_ttl(Duration::ZERO)
            .with_sweep_interval(Duration::ZERO);
        assert_eq!(config.effective_ttl(), DEFAULT_ARTIFACT_TTL);
        assert_eq!(config.effective_sweep_interval(), DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn test_limits_per_category() {
        let config = ArtifactStoreConfig::default().with_limits(10, 20);
        assert_eq!(config.max_bytes_for(MediaCategory::Image), 10);
        assert_eq!(config.max_bytes_for(MediaCategory::PointCloud), 20);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ArtifactStoreConfig::new("").validate().is_err());
        assert!(
            ArtifactStoreConfig::default()
                .with_public_base_url("not a url")
                .validate()
                .is_err()
        );
        assert!(
            ArtifactStoreConfig::default()
                .with_limits(0, 1)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ArtifactStoreConfig =
            serde_json::from_str(r#"{"directory": "/tmp/artifacts"}"#).unwrap();
        assert_eq!(config.directory, PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(config.public_base_url, DEFAULT_PUBLIC_BASE_URL);
    }
}
