//! Backend service with observability.

use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;

use crate::{GenerateRequest, GenerateResponse, GpuTier, Result, SplatBackend, TRACING_TARGET};

/// Shared handle to a [`SplatBackend`] that logs every call.
#[derive(Clone)]
pub struct BackendService {
    backend: Arc<dyn SplatBackend>,
    default_tier: GpuTier,
}

impl fmt::Debug for BackendService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendService")
            .field("backend", &self.backend.name())
            .field("default_tier", &self.default_tier)
            .finish_non_exhaustive()
    }
}

impl BackendService {
    /// Wraps a backend.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: SplatBackend + 'static,
    {
        Self {
            backend: Arc::new(backend),
            default_tier: GpuTier::default(),
        }
    }

    /// Sets the tier used when a caller does not pick one.
    #[must_use]
    pub fn with_default_tier(mut self, tier: GpuTier) -> Self {
        self.default_tier = tier;
        self
    }

    /// Tier used when a caller does not pick one.
    pub fn default_tier(&self) -> GpuTier {
        self.default_tier
    }

    /// Name of the wrapped backend.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generates a splat from `request`.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started_at = Timestamp::now();

        tracing::debug!(
            target: TRACING_TARGET,
            backend = self.backend.name(),
            file_name = %request.file_name,
            tier = %request.tier,
            image_bytes = request.image.len(),
            "Processing generation request"
        );

        let result = self.backend.generate(request).await;
        let elapsed = Timestamp::now().duration_since(started_at);

        match &result {
            Ok(response) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    backend = self.backend.name(),
                    output = %response.file_name,
                    output_bytes = response.bytes.len(),
                    reported_ms = response.elapsed_ms,
                    elapsed_ms = elapsed.as_millis(),
                    "Generation successful"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    backend = self.backend.name(),
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Generation failed"
                );
            }
        }

        result
    }
}
