//! Error types for inference backend calls.

use std::time::Duration;

use splat_core::ErrorKind;

/// Result type alias for inference backend operations.
pub type Result<T, E = UpstreamError> = std::result::Result<T, E>;

/// Upstream response bodies folded into error messages are cut to this many
/// characters.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// Error type for inference backend operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The backend answered with a non-success status.
    #[error("inference backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not finish in time.
    #[error("inference backend timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    /// The request could not be sent or its response could not be read.
    #[error("inference backend request failed: {reason}")]
    Transport { reason: String },

    /// The response body did not match the expected schema.
    #[error("inference backend returned a malformed response: {reason}")]
    Schema { reason: String },

    /// The backend reported a failure of its own.
    #[error("inference backend failed: {reason}")]
    Rejected { reason: String },

    /// No usable backend is configured.
    #[error("inference backend is not configured: {reason}")]
    Configuration { reason: String },
}

impl UpstreamError {
    /// Creates a status error, truncating `body`.
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: truncate_body(body),
        }
    }

    /// Creates a schema error.
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema {
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl ToString) -> Self {
        Self::Transport {
            reason: reason.to_string(),
        }
    }

    /// Creates a backend-reported failure.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns the category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            _ => ErrorKind::Upstream,
        }
    }

    /// Returns `true` if the call timed out.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Cuts `body` to [`MAX_ERROR_BODY_CHARS`] characters, marking the cut.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::transport(format!("connection failed: {err}"))
        } else {
            Self::transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_contains_code_and_body() {
        let err = UpstreamError::status(500, "  boom  ");
        assert_eq!(err.to_string(), "inference backend returned HTTP 500: boom");
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(MAX_ERROR_BODY_CHARS + 10);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));

        let short = "x".repeat(MAX_ERROR_BODY_CHARS);
        assert_eq!(truncate_body(&short), short);
    }

    #[test]
    fn test_timeout_message() {
        let err = UpstreamError::Timeout {
            timeout: Duration::from_millis(1500),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "inference backend timed out after 1500ms");
    }

    #[test]
    fn test_configuration_kind() {
        assert_eq!(
            UpstreamError::configuration("no endpoint").kind(),
            ErrorKind::Configuration
        );
    }
}
