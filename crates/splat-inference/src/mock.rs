//! Mock inference backend.
//!
//! Returns a one-point placeholder splat without contacting anything, so the
//! rest of the pipeline can run without a GPU. Tests script it to delay,
//! fail, or return a payload of their choosing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use splat_ply::{PlyWriter, SplatPoint};

use crate::wire::{encode_payload, file_stem};
use crate::{
    GenerateRequest, GenerateResponse, Result, SplatBackend, TRACING_TARGET, UpstreamError,
    WireResponse,
};

/// Elapsed time the mock reports, in milliseconds.
pub const MOCK_ELAPSED_MS: f64 = 5.0;

/// Behaviour of a [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Artificial latency before answering.
    pub delay: Duration,
    /// Fail every call with this reason.
    pub failure: Option<String>,
    /// Return these bytes instead of the placeholder splat.
    pub payload: Option<Bytes>,
}

/// In-process stand-in for the inference backend.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    config: Arc<MockConfig>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Creates a mock with the given behaviour.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a mock that answers after `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Creates a mock that fails every call.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(MockConfig {
            failure: Some(reason.into()),
            ..Default::default()
        })
    }

    /// Creates a mock that returns `payload` as the generated splat.
    pub fn with_payload(payload: impl Into<Bytes>) -> Self {
        Self::new(MockConfig {
            payload: Some(payload.into()),
            ..Default::default()
        })
    }

    /// Number of generation calls received, including failed ones.
    ///
    /// Clones share the counter.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The placeholder splat: a single point two units in front of the camera.
    pub fn placeholder_splat() -> Vec<u8> {
        PlyWriter::new()
            .with_comment("mock splat")
            .with_point(SplatPoint::at(0.0, 0.0, 2.0))
            .build()
    }
}

#[async_trait::async_trait]
impl SplatBackend for MockBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            target: TRACING_TARGET,
            file_name = %request.file_name,
            delay_ms = self.config.delay.as_millis() as u64,
            "Mock generation"
        );

        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        if let Some(reason) = &self.config.failure {
            return Err(UpstreamError::rejected(reason.clone()));
        }

        let payload = match &self.config.payload {
            Some(payload) => payload.to_vec(),
            None => Self::placeholder_splat(),
        };

        // Round-trip through the wire form so the mock exercises the same
        // validation as real responses.
        WireResponse {
            output_filename: Some(format!("{}-mock.ply", file_stem(&request.file_name))),
            ply_bytes_base64: Some(encode_payload(&payload)),
            elapsed_ms: Some(MOCK_ELAPSED_MS),
        }
        .decode(request, self.config.delay)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![0xff, 0xd8, 0xff], "cat.jpg")
    }

    #[tokio::test]
    async fn test_placeholder_response() {
        let backend = MockBackend::default();
        let response = backend.generate(&request()).await.unwrap();

        assert_eq!(response.file_name, "cat-mock.ply");
        assert_eq!(response.elapsed_ms, MOCK_ELAPSED_MS);
        assert!(splat_ply::is_valid(&response.bytes));
        assert_eq!(splat_ply::summarize(&response.bytes).unwrap().point_count, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = MockBackend::failing("out of memory");
        let err = backend.generate(&request()).await.unwrap_err();
        assert_eq!(err, UpstreamError::rejected("out of memory"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_payload() {
        let backend = MockBackend::with_payload(&b"not a splat"[..]);
        let response = backend.generate(&request()).await.unwrap();
        assert_eq!(&response.bytes[..], b"not a splat");
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_schema_error() {
        let backend = MockBackend::with_payload(Bytes::new());
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_clones_share_call_count() {
        let backend = MockBackend::with_delay(Duration::from_millis(1));
        let clone = backend.clone();
        clone.generate(&request()).await.unwrap();
        assert_eq!(backend.calls(), 1);
    }
}
