//! End-to-end generation scenarios over a real artifact directory.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use splat_core::{ArtifactId, JobId};
use splat_inference::{BackendService, HttpBackend, MockBackend};
use splat_store::{ArtifactStore, ArtifactStoreConfig};
use splat_worker::{JobError, JobManager, JobManagerConfig, JobStatus, StatusUpdate};
use tempfile::TempDir;
use tokio::net::TcpListener;
use url::Url;

const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
const POLL: Duration = Duration::from_millis(5);
const MAX_WAIT: Duration = Duration::from_secs(10);

struct Harness {
    _dir: TempDir,
    store: ArtifactStore,
    manager: JobManager,
}

async fn harness(backend: BackendService, config: JobManagerConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(ArtifactStoreConfig::new(dir.path()));
    store.initialize().await.unwrap();
    let manager = JobManager::new(store.clone(), backend, config);
    Harness {
        _dir: dir,
        store,
        manager,
    }
}

/// Serves `router` as the inference backend on an ephemeral local port.
async fn http_backend(router: Router) -> BackendService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let endpoint = Url::parse(&format!("http://{address}/generate")).unwrap();
    BackendService::from_backend(HttpBackend::new(endpoint, None).unwrap())
}

async fn upload(store: &ArtifactStore) -> ArtifactId {
    store
        .ingest(JPEG, "photos/cat.jpg", "image/jpeg")
        .await
        .unwrap()
        .id
}

async fn finish(manager: &JobManager, job_id: JobId) -> splat_worker::GenerationJob {
    manager
        .wait_for_terminal(job_id, POLL, MAX_WAIT)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_mock_generation_succeeds() {
    let h = harness(
        BackendService::from_backend(MockBackend::default()),
        JobManagerConfig::default(),
    )
    .await;
    let source = upload(&h.store).await;

    let job_id = h
        .manager
        .start(source, Some("My Cat".to_owned()), None)
        .await
        .unwrap();
    let job = finish(&h.manager, job_id).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.error_message, None);
    assert!(job.updated_at >= job.created_at);

    let output_id = job.output_artifact_id.unwrap();
    let output = h.store.get(output_id).await.unwrap();
    assert_eq!(output.display_name, "My Cat");
    assert_eq!(output.extension().as_deref(), Some(".ply"));

    let bytes = h.store.read_bytes(output_id).await.unwrap();
    assert!(splat_ply::is_valid(&bytes));
}

#[tokio::test]
async fn test_missing_source_is_rejected_synchronously() {
    let h = harness(
        BackendService::from_backend(MockBackend::default()),
        JobManagerConfig::default(),
    )
    .await;

    let err = h
        .manager
        .start(ArtifactId::new(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::SourceNotFound { .. }));
    assert!(h.manager.is_empty().await);

    assert!(matches!(
        h.manager.get(JobId::new()).await,
        Err(JobError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_point_cloud_source_is_rejected() {
    let h = harness(
        BackendService::from_backend(MockBackend::default()),
        JobManagerConfig::default(),
    )
    .await;
    let splat = MockBackend::placeholder_splat();
    let source = h
        .store
        .ingest(&splat, "scene.ply", "application/octet-stream")
        .await
        .unwrap();

    let err = h.manager.start(source.id, None, None).await.unwrap_err();
    assert!(matches!(err, JobError::UnsupportedSource { .. }));
}

#[tokio::test]
async fn test_backend_error_fails_the_job() {
    let router = Router::new().route(
        "/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let h = harness(http_backend(router).await, JobManagerConfig::default()).await;
    let source = upload(&h.store).await;

    let job_id = h.manager.start(source, None, None).await.unwrap();
    let job = finish(&h.manager, job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.output_artifact_id, None);
    let message = job.error_message.unwrap();
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("model crashed"), "{message}");

    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let h = harness(
        BackendService::from_backend(MockBackend::with_delay(Duration::from_secs(5))),
        JobManagerConfig::default().with_backend_timeout(Duration::from_millis(50)),
    )
    .await;
    let source = upload(&h.store).await;

    let job_id = h.manager.start(source, None, None).await.unwrap();
    let job = finish(&h.manager, job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("timed out"));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_slow_http_backend_times_out() {
    let router = Router::new().route(
        "/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::INTERNAL_SERVER_ERROR, "too late")
        }),
    );
    let h = harness(
        http_backend(router).await,
        JobManagerConfig::default().with_backend_timeout(Duration::from_millis(100)),
    )
    .await;
    let source = upload(&h.store).await;

    let started = std::time::Instant::now();
    let job_id = h.manager.start(source, None, None).await.unwrap();
    let job = finish(&h.manager, job_id).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.error_message.unwrap();
    assert!(message.contains("timed out"), "{message}");
    assert!(!message.contains("too late"), "{message}");
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_invalid_splat_is_not_stored() {
    let h = harness(
        BackendService::from_backend(MockBackend::with_payload(&b"not a ply file"[..])),
        JobManagerConfig::default(),
    )
    .await;
    let source = upload(&h.store).await;

    let job_id = h.manager.start(source, None, None).await.unwrap();
    let job = finish(&h.manager, job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("invalid splat"));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_terminal_jobs_ignore_updates() {
    let h = harness(
        BackendService::from_backend(MockBackend::default()),
        JobManagerConfig::default(),
    )
    .await;
    let source = upload(&h.store).await;

    let job_id = h.manager.start(source, None, None).await.unwrap();
    let finished = finish(&h.manager, job_id).await;

    let update = StatusUpdate::Failed {
        error_message: "late failure".to_owned(),
    };
    assert!(h.manager.update_status(job_id, update).await.is_none());
    assert!(
        h.manager
            .update_status(job_id, StatusUpdate::Running)
            .await
            .is_none()
    );
    assert_eq!(h.manager.get(job_id).await.unwrap(), finished);
}

#[tokio::test]
async fn test_jobs_expire() {
    let h = harness(
        BackendService::from_backend(MockBackend::default()),
        JobManagerConfig::default().with_job_ttl(Duration::from_millis(100)),
    )
    .await;
    let source = upload(&h.store).await;

    let job_id = h.manager.start(source, None, None).await.unwrap();
    finish(&h.manager, job_id).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        h.manager.get(job_id).await,
        Err(JobError::NotFound { .. })
    ));
}
