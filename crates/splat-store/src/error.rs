//! Artifact store error types.

use std::io;
use std::path::{Path, PathBuf};

use splat_core::{ArtifactId, ErrorKind};
use splat_ply::FormatError;

use crate::media::MediaCategory;

/// Result type for artifact store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors returned by [`ArtifactStore`](crate::ArtifactStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live artifact exists under the given identifier.
    #[error("artifact {id} not found")]
    NotFound { id: ArtifactId },

    /// The upload carried no bytes.
    #[error("{category} payload is empty")]
    EmptyPayload { category: MediaCategory },

    /// The upload exceeded the configured limit for its category.
    #[error("{category} payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        category: MediaCategory,
        size: u64,
        limit: u64,
    },

    /// A point cloud upload failed format validation.
    #[error("invalid point cloud payload: {0}")]
    Format(#[from] FormatError),

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A sidecar record could not be encoded, decoded, or matched to its id.
    #[error("invalid sidecar record {}: {reason}", path.display())]
    Sidecar { path: PathBuf, reason: String },

    /// The store configuration is invalid.
    #[error("invalid artifact store configuration: {reason}")]
    Configuration { reason: String },
}

impl StoreError {
    /// Creates a not-found error for `id`.
    pub fn not_found(id: ArtifactId) -> Self {
        Self::NotFound { id }
    }

    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a sidecar error for the record at `path`.
    pub fn sidecar(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Sidecar {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EmptyPayload { .. } | Self::TooLarge { .. } | Self::Format(_) => {
                ErrorKind::Validation
            }
            Self::Io { .. } | Self::Sidecar { .. } => ErrorKind::Io,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = ArtifactId::new();
        assert_eq!(StoreError::not_found(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::from(FormatError::MissingMagic).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StoreError::io("/tmp", io::Error::other("boom")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            StoreError::configuration("bad").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_too_large_message() {
        let err = StoreError::TooLarge {
            category: MediaCategory::Image,
            size: 11,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "image payload of 11 bytes exceeds the 10 byte limit"
        );
    }
}
