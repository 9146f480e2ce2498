//! Generation job manager.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use splat_core::time::expires_after;
use splat_core::{ArtifactId, JobId};
use splat_inference::{BackendService, GenerateRequest, GpuTier, UpstreamError};
use splat_store::{Artifact, ArtifactStore, MediaCategory};
use tokio::sync::RwLock;

use crate::config::JobManagerConfig;
use crate::error::{JobError, Result};
use crate::job::{GenerationJob, StatusUpdate};

/// Tracing target for job lifecycle events.
pub const TRACING_TARGET: &str = "splat_worker::job";

/// MIME type recorded for generated splats.
pub const SPLAT_MIME_TYPE: &str = "application/octet-stream";

/// Runs image-to-splat generations as pollable background jobs.
///
/// Each job is executed exactly once, in its own task, spawned by
/// [`start`](Self::start). Backend and validation failures are recorded on
/// the job rather than returned to the caller. Jobs live only in memory and
/// disappear once their TTL elapses.
///
/// Cloning is cheap and every clone shares the same job index.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<JobManagerInner>,
}

struct JobManagerInner {
    store: ArtifactStore,
    backend: BackendService,
    config: JobManagerConfig,
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
}

impl JobManager {
    /// Creates a manager that reads sources from and writes results to
    /// `store`.
    pub fn new(store: ArtifactStore, backend: BackendService, config: JobManagerConfig) -> Self {
        Self {
            inner: Arc::new(JobManagerInner {
                store,
                backend,
                config,
                jobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the manager configuration.
    pub fn config(&self) -> &JobManagerConfig {
        &self.inner.config
    }

    /// Returns the artifact store jobs read from and write to.
    pub fn store(&self) -> &ArtifactStore {
        &self.inner.store
    }

    /// Queues a generation for `source_artifact_id` and launches it in the
    /// background.
    ///
    /// `tier` defaults to the backend's default tier.
    ///
    /// # Errors
    ///
    /// Fails without creating a job if the source artifact is not live
    /// ([`JobError::SourceNotFound`]), is not an image
    /// ([`JobError::UnsupportedSource`]), or exceeds the image size limit
    /// ([`JobError::SourceTooLarge`]).
    pub async fn start(
        &self,
        source_artifact_id: ArtifactId,
        display_name: Option<String>,
        tier: Option<GpuTier>,
    ) -> Result<JobId> {
        let source = self
            .inner
            .store
            .get(source_artifact_id)
            .await
            .map_err(|err| JobError::source_lookup(source_artifact_id, err))?;
        self.check_source(&source)?;

        let now = Timestamp::now();
        let job = GenerationJob::queued(
            source_artifact_id,
            display_name,
            tier.unwrap_or_else(|| self.inner.backend.default_tier()),
            now,
            expires_after(now, self.inner.config.effective_job_ttl()),
        );
        let job_id = job.job_id;

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %job_id,
            source_artifact_id = %source_artifact_id,
            tier = %job.tier,
            "Generation job queued"
        );

        self.inner.jobs.write().await.insert(job_id, job);

        let manager = self.clone();
        tokio::spawn(async move { manager.run(job_id).await });

        Ok(job_id)
    }

    /// Returns the current snapshot of a job.
    ///
    /// Expired jobs are swept first, so they are never found.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown or expired jobs.
    pub async fn get(&self, job_id: JobId) -> Result<GenerationJob> {
        self.sweep_expired().await;
        self.inner
            .jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotFound { id: job_id })
    }

    /// Polls a job every `poll_interval` until it is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] if the job is unknown or expires while
    /// waiting, and [`JobError::WaitTimeout`] if it is still running after
    /// `max_wait`.
    pub async fn wait_for_terminal(
        &self,
        job_id: JobId,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<GenerationJob> {
        let poll = async {
            loop {
                let job = self.get(job_id).await?;
                if job.is_terminal() {
                    return Ok::<_, JobError>(job);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(max_wait, poll)
            .await
            .unwrap_or(Err(JobError::WaitTimeout {
                id: job_id,
                waited: max_wait,
            }))
    }

    /// Applies a status change as a whole-record replacement.
    ///
    /// Returns the new snapshot, or `None` if the job is unknown, expired, or
    /// the state machine rejects the change. Terminal jobs never change.
    pub async fn update_status(
        &self,
        job_id: JobId,
        update: StatusUpdate,
    ) -> Option<GenerationJob> {
        let now = Timestamp::now();
        let mut jobs = self.inner.jobs.write().await;

        let current = jobs.get(&job_id).filter(|job| !job.is_expired_at(now))?;
        let Some(next) = current.transition(update.clone(), now) else {
            tracing::debug!(
                target: TRACING_TARGET,
                job_id = %job_id,
                from = %current.status,
                to = %update.status(),
                "Ignored status update"
            );
            return None;
        };

        jobs.insert(job_id, next.clone());
        Some(next)
    }

    /// Removes expired jobs and returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut jobs = self.inner.jobs.write().await;

        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired_at(now));
        let removed = before - jobs.len();

        if removed > 0 {
            tracing::debug!(target: TRACING_TARGET, removed, "Expired jobs swept");
        }
        removed
    }

    /// Number of unexpired jobs.
    pub async fn len(&self) -> usize {
        let now = Timestamp::now();
        self.inner
            .jobs
            .read()
            .await
            .values()
            .filter(|job| !job.is_expired_at(now))
            .count()
    }

    /// Returns `true` if there are no unexpired jobs.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_source(&self, source: &Artifact) -> Result<()> {
        let file_name = source
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let category = MediaCategory::classify(file_name, &source.mime_type);
        if category != MediaCategory::Image {
            return Err(JobError::UnsupportedSource {
                id: source.id,
                category,
            });
        }

        let limit = self.inner.store.config().max_image_bytes;
        if source.size_bytes > limit {
            return Err(JobError::SourceTooLarge {
                id: source.id,
                size: source.size_bytes,
                limit,
            });
        }
        Ok(())
    }

    /// Drives one job from `queued` to a terminal state.
    async fn run(&self, job_id: JobId) {
        let Some(job) = self.update_status(job_id, StatusUpdate::Running).await else {
            tracing::warn!(target: TRACING_TARGET, job_id = %job_id, "Job vanished before it started");
            return;
        };

        tracing::debug!(target: TRACING_TARGET, job_id = %job_id, "Generation job running");

        let update = match self.execute(&job).await {
            Ok(output) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    output_artifact_id = %output.id,
                    size_bytes = output.size_bytes,
                    "Generation job succeeded"
                );
                StatusUpdate::Succeeded {
                    output_artifact_id: output.id,
                }
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    error = %err,
                    kind = %err.kind(),
                    "Generation job failed"
                );
                StatusUpdate::Failed {
                    error_message: err.to_string(),
                }
            }
        };

        if self.update_status(job_id, update).await.is_none() {
            tracing::warn!(
                target: TRACING_TARGET,
                job_id = %job_id,
                "Job expired before its outcome was recorded"
            );
        }
    }

    /// Fetch, infer, validate, persist.
    async fn execute(&self, job: &GenerationJob) -> Result<Artifact> {
        let store = &self.inner.store;
        let source_id = job.source_artifact_id;

        let source = store
            .get(source_id)
            .await
            .map_err(|err| JobError::source_lookup(source_id, err))?;
        let image = store
            .read_bytes(source_id)
            .await
            .map_err(|err| JobError::source_lookup(source_id, err))?;

        let request = GenerateRequest::new(image, source.display_name.clone()).with_tier(job.tier);

        let timeout = self.inner.config.effective_backend_timeout();
        let response = tokio::time::timeout(timeout, self.inner.backend.generate(&request))
            .await
            .map_err(|_| UpstreamError::Timeout { timeout })??;

        splat_ply::validate(&response.bytes)?;

        let display_name = job
            .display_name
            .clone()
            .unwrap_or_else(|| output_display_name(&response.file_name, &request));

        store
            .create(&response.bytes, ".ply", SPLAT_MIME_TYPE, &display_name)
            .await
            .map_err(JobError::Persist)
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("store", &self.inner.store)
            .field("backend", &self.inner.backend)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Display name for a generated splat when the caller gave none.
fn output_display_name(backend_file_name: &str, request: &GenerateRequest) -> String {
    let name = Path::new(backend_file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .unwrap_or_default();

    if name.is_empty() {
        request.default_output_name()
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use splat_inference::MockBackend;
    use tempfile::TempDir;

    use super::*;
    use crate::job::JobStatus;

    const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    async fn manager(dir: &TempDir, backend: MockBackend, config: JobManagerConfig) -> JobManager {
        let store = ArtifactStore::new(splat_store::ArtifactStoreConfig::new(dir.path()));
        JobManager::new(store, BackendService::from_backend(backend), config)
    }

    #[tokio::test]
    async fn test_update_status_ignores_unknown_jobs() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, MockBackend::default(), JobManagerConfig::default()).await;
        assert!(
            manager
                .update_status(JobId::new(), StatusUpdate::Running)
                .await
                .is_none()
        );
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_uses_default_tier_and_display_name() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, MockBackend::default(), JobManagerConfig::default()).await;
        let source = manager
            .store()
            .create(JPEG, ".jpg", "image/jpeg", "cat.jpg")
            .await
            .unwrap();

        let job_id = manager.start(source.id, None, None).await.unwrap();
        let job = manager
            .wait_for_terminal(job_id, Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.tier, GpuTier::A10);
        let output = manager
            .store()
            .get(job.output_artifact_id.unwrap())
            .await
            .unwrap();
        assert_eq!(output.display_name, "cat-mock.ply");
        assert_eq!(output.mime_type, SPLAT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_expired_jobs_are_swept() {
        let dir = TempDir::new().unwrap();
        let config = JobManagerConfig::default().with_job_ttl(Duration::from_millis(20));
        let manager = manager(&dir, MockBackend::default(), config).await;
        let source = manager
            .store()
            .create(JPEG, ".jpg", "image/jpeg", "cat.jpg")
            .await
            .unwrap();

        let job_id = manager.start(source.id, None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(matches!(
            manager.get(job_id).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_for_terminal_times_out() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::with_delay(Duration::from_secs(5));
        let manager = manager(&dir, backend, JobManagerConfig::default()).await;
        let source = manager
            .store()
            .create(JPEG, ".jpg", "image/jpeg", "cat.jpg")
            .await
            .unwrap();

        let job_id = manager.start(source.id, None, None).await.unwrap();
        let err = manager
            .wait_for_terminal(job_id, Duration::from_millis(5), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::WaitTimeout { .. }));
        assert_eq!(manager.get(job_id).await.unwrap().status, JobStatus::Running);
    }

    #[test]
    fn test_output_display_name() {
        let request = GenerateRequest::new(JPEG.to_vec(), "cat.jpg");
        assert_eq!(output_display_name("out/scene.ply", &request), "scene.ply");
        assert_eq!(output_display_name("", &request), "cat.ply");
    }
}
