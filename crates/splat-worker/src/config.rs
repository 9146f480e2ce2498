//! Job manager configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use splat_inference::DEFAULT_BACKEND_TIMEOUT;

/// Default job lifetime: 1 hour.
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`JobManager`](crate::JobManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct JobManagerConfig {
    /// How long a job stays visible after it is created. Zero selects the
    /// default.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "job-ttl-secs",
            env = "JOB_TTL_SECS",
            default_value = "3600",
            value_parser = splat_core::time::parse_secs
        )
    )]
    #[serde(default = "default_job_ttl")]
    pub job_ttl: Duration,

    /// Deadline for the backend call of one job. Zero selects the default.
    ///
    /// Resolved from the backend configuration rather than its own flag.
    #[cfg_attr(feature = "config", arg(skip = DEFAULT_BACKEND_TIMEOUT))]
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout: Duration,
}

fn default_job_ttl() -> Duration {
    DEFAULT_JOB_TTL
}

fn default_backend_timeout() -> Duration {
    DEFAULT_BACKEND_TIMEOUT
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            job_ttl: default_job_ttl(),
            backend_timeout: default_backend_timeout(),
        }
    }
}

impl JobManagerConfig {
    /// Sets the job lifetime.
    #[must_use]
    pub fn with_job_ttl(mut self, job_ttl: Duration) -> Self {
        self.job_ttl = job_ttl;
        self
    }

    /// Sets the backend call deadline.
    #[must_use]
    pub fn with_backend_timeout(mut self, backend_timeout: Duration) -> Self {
        self.backend_timeout = backend_timeout;
        self
    }

    /// Returns the job lifetime, using the default if zero.
    pub fn effective_job_ttl(&self) -> Duration {
        if self.job_ttl.is_zero() {
            DEFAULT_JOB_TTL
        } else {
            self.job_ttl
        }
    }

    /// Returns the backend deadline, using the default if zero.
    pub fn effective_backend_timeout(&self) -> Duration {
        if self.backend_timeout.is_zero() {
            DEFAULT_BACKEND_TIMEOUT
        } else {
            self.backend_timeout
        }
    }
}
