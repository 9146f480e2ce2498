//! Inference backend configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{BackendService, GpuTier, MockBackend, Result, TRACING_TARGET, UpstreamError};

/// Default deadline for one generation call: 5 minutes.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for selecting and calling the inference backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct BackendConfig {
    /// URL generation requests are posted to.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-endpoint-url", env = "BACKEND_ENDPOINT_URL")
    )]
    #[serde(default)]
    pub endpoint_url: Option<Url>,

    /// Deadline for one generation call in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-timeout-ms", env = "BACKEND_TIMEOUT_MS")
    )]
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Deadline in seconds, read when no millisecond value is set.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-timeout-secs", env = "BACKEND_TIMEOUT_SECS")
    )]
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Fall back to the mock backend when no endpoint is configured.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-allow-mock", env = "BACKEND_ALLOW_MOCK", default_value_t = false)
    )]
    #[serde(default)]
    pub allow_mock: bool,

    /// GPU tier used when a job does not ask for one.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-default-tier", env = "BACKEND_DEFAULT_TIER", default_value = "a10")
    )]
    #[serde(default)]
    pub default_tier: GpuTier,

    /// User-Agent header sent to the backend.
    #[cfg_attr(
        feature = "config",
        arg(long = "backend-user-agent", env = "BACKEND_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl BackendConfig {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint_url = Some(endpoint);
        self
    }

    /// Allows falling back to the mock backend.
    #[must_use]
    pub fn with_allow_mock(mut self, allow_mock: bool) -> Self {
        self.allow_mock = allow_mock;
        self
    }

    /// Sets the call deadline in milliseconds.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Resolves the call deadline.
    ///
    /// Milliseconds win over seconds; zero counts as unset, and with neither
    /// set the deadline is [`DEFAULT_BACKEND_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        if let Some(millis) = self.timeout_ms.filter(|millis| *millis > 0) {
            Duration::from_millis(millis)
        } else if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            Duration::from_secs(secs)
        } else {
            DEFAULT_BACKEND_TIMEOUT
        }
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if the endpoint is not an
    /// http(s) URL, or if neither an endpoint nor the mock is available.
    pub fn validate(&self) -> Result<()> {
        match &self.endpoint_url {
            Some(endpoint) if !matches!(endpoint.scheme(), "http" | "https") => {
                Err(UpstreamError::configuration(format!(
                    "endpoint '{endpoint}' must use http or https"
                )))
            }
            Some(_) => Ok(()),
            None if self.allow_mock => Ok(()),
            None => Err(UpstreamError::configuration(
                "set BACKEND_ENDPOINT_URL or enable BACKEND_ALLOW_MOCK",
            )),
        }
    }

    /// Builds the configured backend.
    ///
    /// An endpoint selects the HTTP backend; otherwise the mock is used if
    /// allowed.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if no backend can be built.
    pub fn into_backend(self) -> Result<BackendService> {
        self.validate()?;

        let service = match self.endpoint_url {
            Some(endpoint) => Self::http_backend(endpoint, self.user_agent.as_deref())?,
            None => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    "No inference endpoint configured, using the mock backend"
                );
                BackendService::from_backend(MockBackend::default())
            }
        };

        Ok(service.with_default_tier(self.default_tier))
    }

    #[cfg(feature = "reqwest")]
    fn http_backend(endpoint: Url, user_agent: Option<&str>) -> Result<BackendService> {
        crate::HttpBackend::new(endpoint, user_agent).map(BackendService::from_backend)
    }

    #[cfg(not(feature = "reqwest"))]
    fn http_backend(endpoint: Url, _user_agent: Option<&str>) -> Result<BackendService> {
        Err(UpstreamError::configuration(format!(
            "endpoint '{endpoint}' requires the `reqwest` feature"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_prefers_millis() {
        let config = BackendConfig {
            timeout_ms: Some(1500),
            timeout_secs: Some(9),
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_timeout_falls_back_to_secs_then_default() {
        let config = BackendConfig {
            timeout_ms: Some(0),
            timeout_secs: Some(9),
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(9));
        assert_eq!(BackendConfig::default().timeout(), DEFAULT_BACKEND_TIMEOUT);
    }

    #[test]
    fn test_into_backend_requires_a_backend() {
        let err = BackendConfig::default().into_backend().unwrap_err();
        assert!(matches!(err, UpstreamError::Configuration { .. }));
    }

    #[test]
    fn test_into_backend_uses_mock_when_allowed() {
        let service = BackendConfig::default()
            .with_allow_mock(true)
            .into_backend()
            .unwrap();
        assert_eq!(service.name(), "mock");
        assert_eq!(service.default_tier(), GpuTier::A10);
    }

    #[test]
    fn test_validate_rejects_other_schemes() {
        let config =
            BackendConfig::default().with_endpoint(Url::parse("file:///tmp/socket").unwrap());
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_into_backend_prefers_endpoint() {
        let service = BackendConfig::default()
            .with_allow_mock(true)
            .with_endpoint(Url::parse("http://127.0.0.1:9/generate").unwrap())
            .into_backend()
            .unwrap();
        assert_eq!(service.name(), "http");
    }
}
