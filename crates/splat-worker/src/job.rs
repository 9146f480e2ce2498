//! Generation job records and their state machine.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use splat_core::time::is_expired;
use splat_core::{ArtifactId, JobId};
use splat_inference::GpuTier;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Lifecycle state of a generation job.
///
/// ```text
/// queued -> running -> succeeded
///                   -> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Returns `true` for `succeeded` and `failed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns `true` if the state machine allows moving to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// A requested change to a job's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Running,
    Succeeded { output_artifact_id: ArtifactId },
    Failed { error_message: String },
}

impl StatusUpdate {
    /// Status the job ends up in.
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Running => JobStatus::Running,
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Snapshot of one generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub job_id: JobId,
    pub status: JobStatus,
    pub source_artifact_id: ArtifactId,
    /// Set only once the job has succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact_id: Option<ArtifactId>,
    /// Set only once the job has failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub tier: GpuTier,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
}

impl GenerationJob {
    /// Creates a job in the `queued` state.
    pub fn queued(
        source_artifact_id: ArtifactId,
        display_name: Option<String>,
        tier: GpuTier,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            status: JobStatus::Queued,
            source_artifact_id,
            output_artifact_id: None,
            error_message: None,
            display_name,
            tier,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// Returns `true` once the job's lifetime has elapsed at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(self.expires_at, now)
    }

    /// Returns `true` if the job has finished.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Builds the record that results from applying `update` at `now`.
    ///
    /// Returns `None` if the state machine does not allow the change.
    pub fn transition(&self, update: StatusUpdate, now: Timestamp) -> Option<Self> {
        if !self.status.can_transition_to(update.status()) {
            return None;
        }

        let mut next = self.clone();
        next.status = update.status();
        next.updated_at = now;
        match update {
            StatusUpdate::Running => {}
            StatusUpdate::Succeeded { output_artifact_id } => {
                next.output_artifact_id = Some(output_artifact_id);
            }
            StatusUpdate::Failed { error_message } => {
                next.error_message = Some(error_message);
            }
        }
        Some(next)
    }
}
