//! Artifact records and their persisted sidecar form.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use splat_core::ArtifactId;
use splat_core::time::{from_unix_millis, is_expired};

/// Suffix of sidecar record files.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Suffix of data files that are still being written.
pub(crate) const STAGING_SUFFIX: &str = ".part";

/// A stored binary blob.
///
/// Records are immutable; a changed artifact is a new artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: ArtifactId,
    /// Absolute path of the data file.
    pub path: PathBuf,
    pub mime_type: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub expires_at: Timestamp,
}

impl Artifact {
    /// Returns `true` once the artifact's lifetime has elapsed at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(self.expires_at, now)
    }

    /// Extension of the data file, including the leading dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(OsStr::to_str)
            .map(|extension| format!(".{extension}"))
    }
}

/// On-disk form of an [`Artifact`], stored as `<id>.meta.json`.
///
/// The identifier is recovered from the sidecar's file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SidecarRecord {
    pub absolute_file_path: PathBuf,
    pub expires_at_unix_ms: i64,
    pub mime_type: String,
    pub file_size_bytes: u64,
    pub display_name: String,
}

impl SidecarRecord {
    /// Rebuilds the artifact, resolving the data file inside `directory`.
    ///
    /// Returns `None` when the recorded data file does not belong to `id`.
    pub fn into_artifact(self, id: ArtifactId, directory: &Path) -> Option<Artifact> {
        let file_name = self.absolute_file_path.file_name()?.to_str()?;
        if !file_name.starts_with(&id.to_string()) || file_name.ends_with(STAGING_SUFFIX) {
            return None;
        }

        Some(Artifact {
            id,
            path: directory.join(file_name),
            mime_type: self.mime_type,
            display_name: self.display_name,
            size_bytes: self.file_size_bytes,
            expires_at: from_unix_millis(self.expires_at_unix_ms),
        })
    }

    /// Returns `true` once the recorded lifetime has elapsed at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(from_unix_millis(self.expires_at_unix_ms), now)
    }
}

impl From<&Artifact> for SidecarRecord {
    fn from(artifact: &Artifact) -> Self {
        Self {
            absolute_file_path: artifact.path.clone(),
            expires_at_unix_ms: artifact.expires_at.as_millisecond(),
            mime_type: artifact.mime_type.clone(),
            file_size_bytes: artifact.size_bytes,
            display_name: artifact.display_name.clone(),
        }
    }
}

/// What a file in the artifact directory is, judged by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoredFile {
    Sidecar(ArtifactId),
    Data(ArtifactId),
    Staging(ArtifactId),
}

impl StoredFile {
    /// Classifies a directory entry; unrelated files yield `None`.
    pub fn from_file_name(file_name: &OsStr) -> Option<Self> {
        let file_name = file_name.to_str()?;

        if file_name.ends_with(STAGING_SUFFIX) {
            return leading_id(file_name).map(Self::Staging);
        }
        if let Some(stem) = file_name.strip_suffix(SIDECAR_SUFFIX) {
            return ArtifactId::parse(stem).ok().map(Self::Sidecar);
        }
        leading_id(file_name).map(Self::Data)
    }

    /// Returns the artifact a data or staging file belongs to.
    pub fn data_of(self) -> Option<ArtifactId> {
        match self {
            Self::Data(id) | Self::Staging(id) => Some(id),
            Self::Sidecar(_) => None,
        }
    }
}

/// Parses the artifact id a data file name starts with.
fn leading_id(file_name: &str) -> Option<ArtifactId> {
    let stem = file_name.split('.').next()?;
    ArtifactId::parse(stem).ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use splat_core::time::expires_after;

    use super::*;

    fn artifact(id: ArtifactId) -> Artifact {
        Artifact {
            id,
            path: PathBuf::from(format!("/data/{id}.ply")),
            mime_type: "application/octet-stream".to_owned(),
            display_name: "scene.ply".to_owned(),
            size_bytes: 42,
            expires_at: expires_after(Timestamp::now(), Duration::from_secs(60)),
        }
    }

    #[test]
    fn test_sidecar_round_trip() {
        let id = ArtifactId::new();
        let original = artifact(id);

        let json = serde_json::to_string(&SidecarRecord::from(&original)).unwrap();
        assert!(json.contains("\"absoluteFilePath\""));
        assert!(json.contains("\"expiresAtUnixMs\""));

        let record: SidecarRecord = serde_json::from_str(&json).unwrap();
        let restored = record.into_artifact(id, Path::new("/data")).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.extension().as_deref(), Some(".ply"));
    }

    #[test]
    fn test_sidecar_for_another_id_is_rejected() {
        let record = SidecarRecord::from(&artifact(ArtifactId::new()));
        assert!(record.into_artifact(ArtifactId::new(), Path::new("/data")).is_none());
    }

    #[test]
    fn test_stored_file_classification() {
        let id = ArtifactId::new();
        assert_eq!(
            StoredFile::from_file_name(OsStr::new(&format!("{id}.meta.json"))),
            Some(StoredFile::Sidecar(id))
        );
        assert_eq!(
            StoredFile::from_file_name(OsStr::new(&format!("{id}.jpg"))),
            Some(StoredFile::Data(id))
        );
        assert_eq!(
            StoredFile::from_file_name(OsStr::new(&format!("{id}.jpg.part"))),
            Some(StoredFile::Staging(id))
        );
        assert_eq!(StoredFile::from_file_name(OsStr::new("notes.txt")), None);
    }
}
