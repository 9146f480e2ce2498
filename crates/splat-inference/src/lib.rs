#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod mock;
mod service;
mod tier;
mod wire;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
mod http;

pub use config::{BackendConfig, DEFAULT_BACKEND_TIMEOUT};
pub use error::{MAX_ERROR_BODY_CHARS, Result, UpstreamError, truncate_body};
#[cfg(feature = "reqwest")]
pub use http::HttpBackend;
pub use mock::{MOCK_ELAPSED_MS, MockBackend, MockConfig};
pub use service::BackendService;
pub use tier::GpuTier;
pub use wire::{GenerateRequest, GenerateResponse, WireRequest, WireResponse};

/// Tracing target for inference backend operations.
pub const TRACING_TARGET: &str = "splat_inference::backend";

/// Turns source images into Gaussian splats.
///
/// Implementations return the payload exactly as produced; callers are
/// expected to validate it before storing or serving it.
#[async_trait::async_trait]
pub trait SplatBackend: Send + Sync {
    /// Generates a splat for one source image.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
