//! Reqwest-based client for the inference backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::{
    GenerateRequest, GenerateResponse, Result, SplatBackend, TRACING_TARGET, UpstreamError,
    WireResponse,
};

/// Time allowed for establishing a connection to the backend.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct HttpBackendInner {
    http: Client,
    endpoint: Url,
}

/// Inference backend reached over HTTP.
///
/// Each generation is a single JSON `POST` to the configured endpoint. The
/// overall call deadline is left to the caller; only connection setup is
/// bounded here.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if the endpoint is not an
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(endpoint: Url, user_agent: Option<&str>) -> Result<Self> {
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(UpstreamError::configuration(format!(
                "endpoint '{endpoint}' must use http or https"
            )));
        }

        let user_agent = user_agent
            .map(str::to_owned)
            .unwrap_or_else(|| format!("splat/{}", env!("CARGO_PKG_VERSION")));

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|err| UpstreamError::configuration(format!("cannot build HTTP client: {err}")))?;

        tracing::debug!(
            target: TRACING_TARGET,
            endpoint = %endpoint,
            "Created HTTP inference backend"
        );

        Ok(Self {
            inner: Arc::new(HttpBackendInner { http, endpoint }),
        })
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

#[async_trait::async_trait]
impl SplatBackend for HttpBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started_at = Timestamp::now();

        let body = serde_json::to_vec(&request.to_wire())
            .map_err(|err| UpstreamError::transport(format!("cannot encode request: {err}")))?;

        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let payload = response.bytes().await?;

        tracing::debug!(
            target: TRACING_TARGET,
            status = status.as_u16(),
            response_bytes = payload.len(),
            "Inference backend responded"
        );

        if !status.is_success() {
            return Err(UpstreamError::status(
                status.as_u16(),
                &String::from_utf8_lossy(&payload),
            ));
        }

        let measured = Timestamp::now()
            .duration_since(started_at)
            .unsigned_abs();

        WireResponse::from_slice(&payload)
            .and_then(|wire| wire.decode(request, measured))
            .map_err(|err| match err {
                UpstreamError::Schema { reason } => UpstreamError::schema(format!(
                    "{reason}; body: {}",
                    crate::error::truncate_body(&String::from_utf8_lossy(&payload))
                )),
                other => other,
            })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use tokio::net::TcpListener;

    use super::*;
    use crate::GpuTier;

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn serve(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{address}/generate")).unwrap()
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![0xff, 0xd8, 0xff], "cat.jpg").with_tier(GpuTier::A100)
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let router = Router::new().route(
            "/generate",
            post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                assert_eq!(body["filename"], "cat.jpg");
                assert_eq!(body["gpuTier"], "a100");
                assert_eq!(body["imageBytesBase64"], "/9j/");
                axum::Json(serde_json::json!({
                    "outputFilename": "cat.ply",
                    "plyBytesBase64": STANDARD.encode(b"ply-bytes"),
                    "elapsedMs": 42.0,
                }))
            }),
        );
        let backend = HttpBackend::new(serve(router).await, None).unwrap();

        let response = backend.generate(&request()).await.unwrap();
        assert_eq!(response.file_name, "cat.ply");
        assert_eq!(&response.bytes[..], b"ply-bytes");
        assert_eq!(response.elapsed_ms, 42.0);
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let router = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "GPU exploded") }),
        );
        let backend = HttpBackend::new(serve(router).await, None).unwrap();

        let err = backend.generate(&request()).await.unwrap_err();
        assert_eq!(err, UpstreamError::status(500, "GPU exploded"));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_schema_error() {
        let router = Router::new().route("/generate", post(|| async { "definitely not json" }));
        let backend = HttpBackend::new(serve(router).await, None).unwrap();

        let err = backend.generate(&request()).await.unwrap_err();
        let UpstreamError::Schema { reason } = err else {
            panic!("expected a schema error, got {err:?}");
        };
        assert!(reason.contains("definitely not json"));
    }

    #[tokio::test]
    async fn test_missing_payload_is_a_schema_error() {
        let router = Router::new().route(
            "/generate",
            post(|| async { axum::Json(serde_json::json!({ "elapsedMs": 1.0 })) }),
        );
        let backend = HttpBackend::new(serve(router).await, None).unwrap();

        assert!(matches!(
            backend.generate(&request()).await,
            Err(UpstreamError::Schema { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Url::parse(&format!("http://{address}/generate")).unwrap();
        let backend = HttpBackend::new(endpoint, None).unwrap();
        assert!(matches!(
            backend.generate(&request()).await,
            Err(UpstreamError::Transport { .. })
        ));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let endpoint = Url::parse("ftp://example.com/generate").unwrap();
        assert!(matches!(
            HttpBackend::new(endpoint, None),
            Err(UpstreamError::Configuration { .. })
        ));
    }
}
