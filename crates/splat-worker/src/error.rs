//! Job manager error types.

use std::time::Duration;

use splat_core::{ArtifactId, ErrorKind, JobId};
use splat_inference::UpstreamError;
use splat_ply::FormatError;
use splat_store::{MediaCategory, StoreError};

/// Result type alias for job manager operations.
pub type Result<T, E = JobError> = std::result::Result<T, E>;

/// Errors returned by [`JobManager`](crate::JobManager) and recorded on
/// failed jobs.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No live job exists under the given identifier.
    #[error("job {id} not found")]
    NotFound { id: JobId },

    /// The source artifact is missing or expired.
    #[error("source artifact {id} not found")]
    SourceNotFound { id: ArtifactId },

    /// The source artifact is not an image.
    #[error("source artifact {id} is a {category} payload, expected an image")]
    UnsupportedSource {
        id: ArtifactId,
        category: MediaCategory,
    },

    /// The source artifact exceeds the image size limit.
    #[error("source artifact {id} is {size} bytes, above the {limit} byte image limit")]
    SourceTooLarge { id: ArtifactId, size: u64, limit: u64 },

    /// The artifact store failed while reading the source.
    #[error("failed to read source artifact: {0}")]
    Store(#[source] StoreError),

    /// The inference backend failed, timed out, or answered malformed data.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The backend answered with a payload that is not an acceptable splat.
    #[error("inference backend returned an invalid splat: {0}")]
    InvalidOutput(#[from] FormatError),

    /// The generated splat could not be stored.
    #[error("failed to store generated splat: {0}")]
    Persist(#[source] StoreError),

    /// A job did not reach a terminal state while being waited on.
    #[error("job {id} did not finish within {}ms", waited.as_millis())]
    WaitTimeout { id: JobId, waited: Duration },
}

impl JobError {
    /// Maps a store error raised while resolving a source artifact.
    pub(crate) fn source_lookup(id: ArtifactId, err: StoreError) -> Self {
        if err.is_not_found() {
            Self::SourceNotFound { id }
        } else {
            Self::Store(err)
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::SourceNotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedSource { .. } | Self::SourceTooLarge { .. } => ErrorKind::Validation,
            Self::Store(err) => err.kind(),
            Self::Upstream(err) => err.kind(),
            Self::InvalidOutput(_) | Self::WaitTimeout { .. } => ErrorKind::Upstream,
            Self::Persist(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_map_to_not_found() {
        let id = ArtifactId::new();
        let err = JobError::source_lookup(id, StoreError::not_found(id));
        assert!(matches!(err, JobError::SourceNotFound { .. }));
        assert!(err.kind().is_client_error());
    }

    #[test]
    fn test_upstream_message_is_preserved() {
        let err = JobError::from(UpstreamError::status(502, "bad gateway"));
        assert_eq!(err.to_string(), "inference backend returned HTTP 502: bad gateway");
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn test_validation_kinds() {
        let err = JobError::UnsupportedSource {
            id: ArtifactId::new(),
            category: MediaCategory::PointCloud,
        };
        assert!(err.to_string().contains("point_cloud"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
