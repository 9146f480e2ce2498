//! File-backed artifact store.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use jiff::Timestamp;
use splat_core::ArtifactId;
use splat_core::time::expires_after;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::artifact::{Artifact, SIDECAR_SUFFIX, STAGING_SUFFIX, SidecarRecord, StoredFile};
use crate::config::ArtifactStoreConfig;
use crate::error::{Result, StoreError};
use crate::media::{self, MediaCategory};
use crate::sweeper::Sweeper;

/// Tracing target for artifact store operations.
pub const TRACING_TARGET: &str = "splat_store::artifact";

/// Unreferenced files younger than this are left alone during reconciliation,
/// since another instance may still be writing their sidecar.
const ORPHAN_GRACE: Duration = Duration::from_secs(60);

/// Ephemeral artifact store.
///
/// Each artifact is a data file `<id><ext>` and a sidecar record
/// `<id>.meta.json`. The in-memory index caches sidecar records; reads that
/// miss it hydrate from disk, so a fresh process serves artifacts written by
/// an earlier one without a full directory scan.
///
/// Cloning is cheap and every clone shares the same index.
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<ArtifactStoreInner>,
}

pub(crate) struct ArtifactStoreInner {
    config: ArtifactStoreConfig,
    directory: PathBuf,
    index: RwLock<HashMap<ArtifactId, Artifact>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl ArtifactStore {
    /// Creates a store over `config.directory`.
    ///
    /// Nothing touches the filesystem until [`initialize`](Self::initialize)
    /// or the first operation.
    pub fn new(config: ArtifactStoreConfig) -> Self {
        let directory =
            std::path::absolute(&config.directory).unwrap_or_else(|_| config.directory.clone());

        Self {
            inner: Arc::new(ArtifactStoreInner {
                config,
                directory,
                index: RwLock::new(HashMap::new()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ArtifactStoreInner>) -> Self {
        Self { inner }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &ArtifactStoreConfig {
        &self.inner.config
    }

    /// Returns the absolute artifact directory.
    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    /// Prepares the directory, reconciles the index with disk, and starts the
    /// background sweeper.
    ///
    /// Sidecars that are unreadable, expired, or point at a missing data file
    /// are deleted together with whatever else belongs to their id. Data and
    /// staging files without a valid sidecar are deleted once they are older
    /// than a short grace period. Calling this again re-runs reconciliation
    /// but never starts a second sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created or
    /// listed.
    pub async fn initialize(&self) -> Result<()> {
        let directory = self.directory();
        fs::create_dir_all(directory)
            .await
            .map_err(|err| StoreError::io(directory, err))?;

        let (loaded, removed) = self.reconcile().await?;

        let mut sweeper = self.inner.sweeper.lock().await;
        if sweeper.is_none() {
            *sweeper = Some(Sweeper::spawn(
                Arc::downgrade(&self.inner),
                self.config().effective_sweep_interval(),
            ));
        }

        tracing::info!(
            target: TRACING_TARGET,
            directory = %directory.display(),
            loaded,
            removed,
            "Artifact store initialized"
        );

        Ok(())
    }

    /// Stops the background sweeper, waiting for an in-progress sweep.
    pub async fn shutdown(&self) {
        let sweeper = self.inner.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
            tracing::debug!(target: TRACING_TARGET, "Artifact store shut down");
        }
    }

    /// Stores `bytes` as a new artifact with the configured lifetime.
    ///
    /// `extension` may be given with or without its dot; anything that is not
    /// a short alphanumeric token is stored as `.bin`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if either file cannot be written, in which
    /// case neither is left behind.
    pub async fn create(
        &self,
        bytes: &[u8],
        extension: &str,
        mime_type: &str,
        display_name: &str,
    ) -> Result<Artifact> {
        let ttl = self.config().effective_ttl();
        self.create_with_ttl(bytes, extension, mime_type, display_name, ttl)
            .await
    }

    /// Stores `bytes` as a new artifact that expires `ttl` from now.
    ///
    /// Unlike [`create`](Self::create), a zero `ttl` is taken literally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if either file cannot be written, in which
    /// case neither is left behind.
    pub async fn create_with_ttl(
        &self,
        bytes: &[u8],
        extension: &str,
        mime_type: &str,
        display_name: &str,
        ttl: Duration,
    ) -> Result<Artifact> {
        let id = ArtifactId::new();
        let extension = media::sanitize_extension(extension);
        let path = self.directory().join(format!("{id}{extension}"));

        write_staged(&path, bytes).await?;

        let artifact = Artifact {
            id,
            path,
            mime_type: mime_type.to_owned(),
            display_name: display_name.to_owned(),
            size_bytes: bytes.len() as u64,
            expires_at: expires_after(Timestamp::now(), ttl),
        };

        if let Err(err) = self.write_sidecar(&artifact).await {
            if let Err(cleanup) = remove_if_exists(&artifact.path).await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    artifact_id = %id,
                    error = %cleanup,
                    "Failed to remove data file after sidecar write failure"
                );
            }
            return Err(err);
        }

        self.inner
            .index
            .write()
            .await
            .insert(id, artifact.clone());

        tracing::debug!(
            target: TRACING_TARGET,
            artifact_id = %id,
            size_bytes = artifact.size_bytes,
            mime_type = %artifact.mime_type,
            expires_at = %artifact.expires_at,
            "Artifact created"
        );

        Ok(artifact)
    }

    /// Accepts an upload: classifies it, enforces the size limit for its
    /// category, validates point clouds, and stores it.
    ///
    /// Images without an extension get one sniffed from their leading bytes.
    /// An empty `mime_type` is replaced by one derived from the category.
    ///
    /// # Errors
    ///
    /// Returns a validation error ([`StoreError::EmptyPayload`],
    /// [`StoreError::TooLarge`], or [`StoreError::Format`]) for rejected
    /// uploads, or [`StoreError::Io`] if storing fails.
    pub async fn ingest(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<Artifact> {
        let file_name = media::normalize_file_name(file_name);
        let category = MediaCategory::classify(&file_name, mime_type);

        if bytes.is_empty() {
            return Err(StoreError::EmptyPayload { category });
        }

        let size = bytes.len() as u64;
        let limit = self.config().max_bytes_for(category);
        if size > limit {
            return Err(StoreError::TooLarge {
                category,
                size,
                limit,
            });
        }

        let extension = match category {
            MediaCategory::PointCloud => {
                splat_ply::validate(bytes)?;
                ".ply".to_owned()
            }
            MediaCategory::Image => match media::extension_of(&file_name) {
                Some(extension) => format!(".{extension}"),
                None => media::sniff_image_extension(bytes).to_owned(),
            },
        };

        let mime_type = match mime_type.trim() {
            "" => category.default_mime_type(&extension),
            given => given,
        };

        tracing::debug!(
            target: TRACING_TARGET,
            category = %category,
            file_name = %file_name,
            size,
            "Ingesting upload"
        );

        self.create(bytes, &extension, mime_type, &file_name).await
    }

    /// Looks up a live artifact.
    ///
    /// Misses in memory hydrate from the sidecar on disk. An artifact that
    /// has expired, whose sidecar is invalid, or whose data file is gone is
    /// deleted and reported as not found.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for absent or evicted artifacts and
    /// [`StoreError::Io`] if the filesystem cannot be queried.
    pub async fn get(&self, id: ArtifactId) -> Result<Artifact> {
        let cached = self.inner.index.read().await.get(&id).cloned();

        let (artifact, hydrated) = match cached {
            Some(artifact) => {
                let sidecar = self.sidecar_path(id);
                let exists = fs::try_exists(&sidecar)
                    .await
                    .map_err(|err| StoreError::io(&sidecar, err))?;
                if !exists {
                    self.evict(id, "sidecar missing").await;
                    return Err(StoreError::not_found(id));
                }
                (artifact, false)
            }
            None => match self.read_sidecar(id).await {
                Ok(Some(artifact)) => (artifact, true),
                Ok(None) => return Err(StoreError::not_found(id)),
                Err(err @ StoreError::Sidecar { .. }) => {
                    self.evict(id, &err.to_string()).await;
                    return Err(StoreError::not_found(id));
                }
                Err(err) => return Err(err),
            },
        };

        if artifact.is_expired_at(Timestamp::now()) {
            self.evict(id, "expired").await;
            return Err(StoreError::not_found(id));
        }

        let exists = fs::try_exists(&artifact.path)
            .await
            .map_err(|err| StoreError::io(&artifact.path, err))?;
        if !exists {
            self.evict(id, "data file missing").await;
            return Err(StoreError::not_found(id));
        }

        if hydrated {
            tracing::debug!(target: TRACING_TARGET, artifact_id = %id, "Hydrated artifact from sidecar");
            self.inner
                .index
                .write()
                .await
                .insert(id, artifact.clone());
        }

        Ok(artifact)
    }

    /// Reads the bytes of a live artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the artifact is not live or its
    /// data file disappears before it can be read.
    pub async fn read_bytes(&self, id: ArtifactId) -> Result<Bytes> {
        let artifact = self.get(id).await?;

        match fs::read(&artifact.path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                self.evict(id, "data file vanished during read").await;
                Err(StoreError::not_found(id))
            }
            Err(err) => Err(StoreError::io(&artifact.path, err)),
        }
    }

    /// Removes an artifact's data file, sidecar, and index entry.
    ///
    /// Deleting an unknown or partially removed artifact succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if an existing file cannot be removed.
    pub async fn delete(&self, id: ArtifactId) -> Result<()> {
        let cached = self.inner.index.write().await.remove(&id);

        let data_path = match cached {
            Some(artifact) => Some(artifact.path),
            None => self
                .read_sidecar(id)
                .await
                .ok()
                .flatten()
                .map(|artifact| artifact.path),
        };

        match data_path {
            Some(data_path) => remove_if_exists(&data_path).await?,
            None => {
                for file_name in self.list_directory().await? {
                    let owner = StoredFile::from_file_name(&file_name).and_then(StoredFile::data_of);
                    if owner == Some(id) {
                        remove_if_exists(&self.directory().join(&file_name)).await?;
                    }
                }
            }
        }
        remove_if_exists(&self.sidecar_path(id)).await?;

        tracing::debug!(target: TRACING_TARGET, artifact_id = %id, "Artifact deleted");
        Ok(())
    }

    /// Deletes every expired artifact, whether indexed in memory or known
    /// only from a sidecar on disk, and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    /// Failures to delete individual artifacts are logged and skipped.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = Timestamp::now();

        let (mut expired, tracked): (HashSet<ArtifactId>, HashSet<ArtifactId>) = {
            let index = self.inner.index.read().await;
            let expired = index
                .values()
                .filter(|artifact| artifact.is_expired_at(now))
                .map(|artifact| artifact.id)
                .collect();
            (expired, index.keys().copied().collect())
        };

        for file_name in self.list_directory().await? {
            let Some(StoredFile::Sidecar(id)) = StoredFile::from_file_name(&file_name) else {
                continue;
            };
            if tracked.contains(&id) {
                continue;
            }
            if let Ok(Some(artifact)) = self.read_sidecar(id).await
                && artifact.is_expired_at(now)
            {
                expired.insert(id);
            }
        }

        let mut removed = 0;
        for id in expired {
            match self.delete(id).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        artifact_id = %id,
                        error = %err,
                        "Failed to delete expired artifact"
                    );
                }
            }
        }

        if removed > 0 {
            tracing::debug!(target: TRACING_TARGET, removed, "Expired artifacts swept");
        }
        Ok(removed)
    }

    /// Returns the URL under which `id` is published.
    pub fn public_url(&self, id: ArtifactId) -> String {
        let base = self.config().public_base_url.trim_end_matches('/');
        format!("{base}/artifacts/{id}")
    }

    /// Number of artifacts currently indexed in memory.
    pub async fn len(&self) -> usize {
        self.inner.index.read().await.len()
    }

    /// Returns `true` if no artifacts are indexed in memory.
    pub async fn is_empty(&self) -> bool {
        self.inner.index.read().await.is_empty()
    }

    /// Unexpired artifacts indexed in memory, oldest first.
    pub async fn list(&self) -> Vec<Artifact> {
        let now = Timestamp::now();
        let mut artifacts: Vec<Artifact> = self
            .inner
            .index
            .read()
            .await
            .values()
            .filter(|artifact| !artifact.is_expired_at(now))
            .cloned()
            .collect();
        artifacts.sort_by_key(|artifact| artifact.id);
        artifacts
    }

    /// Brings the index and directory into agreement.
    ///
    /// Returns the number of artifacts loaded and the number of artifacts or
    /// stray files removed.
    async fn reconcile(&self) -> Result<(usize, usize)> {
        let now = Timestamp::now();
        let mut sidecars = Vec::new();
        let mut strays = Vec::new();

        for file_name in self.list_directory().await? {
            match StoredFile::from_file_name(&file_name) {
                Some(StoredFile::Sidecar(id)) => sidecars.push(id),
                Some(StoredFile::Data(id)) => strays.push((Some(id), file_name)),
                Some(StoredFile::Staging(_)) => strays.push((None, file_name)),
                None => {}
            }
        }

        let mut live = HashMap::with_capacity(sidecars.len());
        let mut removed = 0;

        for id in sidecars {
            let reason = match self.read_sidecar(id).await {
                Ok(Some(artifact)) if artifact.is_expired_at(now) => "expired".to_owned(),
                Ok(Some(artifact)) => match fs::try_exists(&artifact.path).await {
                    Ok(true) => {
                        live.insert(id, artifact);
                        continue;
                    }
                    Ok(false) => "data file missing".to_owned(),
                    Err(err) => return Err(StoreError::io(&artifact.path, err)),
                },
                Ok(None) => continue,
                Err(err @ StoreError::Sidecar { .. }) => err.to_string(),
                Err(err) => return Err(err),
            };
            self.evict(id, &reason).await;
            removed += 1;
        }

        for (id, file_name) in strays {
            if id.is_some_and(|id| live.contains_key(&id)) {
                continue;
            }
            let path = self.directory().join(&file_name);
            if !is_older_than(&path, ORPHAN_GRACE).await {
                continue;
            }
            match remove_if_exists(&path).await {
                Ok(()) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        path = %path.display(),
                        "Removed file without a sidecar record"
                    );
                    removed += 1;
                }
                Err(err) => {
                    tracing::warn!(target: TRACING_TARGET, error = %err, "Failed to remove stray file");
                }
            }
        }

        let stale: Vec<ArtifactId> = {
            let mut index = self.inner.index.write().await;
            let stale = index
                .keys()
                .filter(|id| !live.contains_key(id))
                .copied()
                .collect();
            index.extend(live.iter().map(|(id, artifact)| (*id, artifact.clone())));
            stale
        };
        for id in stale {
            let sidecar = self.sidecar_path(id);
            let exists = fs::try_exists(&sidecar)
                .await
                .map_err(|err| StoreError::io(&sidecar, err))?;
            if exists {
                continue;
            }
            self.evict(id, "sidecar missing").await;
            removed += 1;
        }

        Ok((live.len(), removed))
    }

    /// Deletes an inconsistent or expired artifact, logging instead of
    /// failing.
    async fn evict(&self, id: ArtifactId, reason: &str) {
        tracing::warn!(target: TRACING_TARGET, artifact_id = %id, reason, "Evicting artifact");
        if let Err(err) = self.delete(id).await {
            tracing::warn!(
                target: TRACING_TARGET,
                artifact_id = %id,
                error = %err,
                "Failed to evict artifact"
            );
        }
    }

    fn sidecar_path(&self, id: ArtifactId) -> PathBuf {
        self.directory().join(format!("{id}{SIDECAR_SUFFIX}"))
    }

    /// Loads the sidecar for `id`; `Ok(None)` if there is none.
    async fn read_sidecar(&self, id: ArtifactId) -> Result<Option<Artifact>> {
        let path = self.sidecar_path(id);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        let record: SidecarRecord =
            serde_json::from_slice(&contents).map_err(|err| StoreError::sidecar(&path, err))?;

        record
            .into_artifact(id, self.directory())
            .map(Some)
            .ok_or_else(|| StoreError::sidecar(&path, "data file does not belong to this artifact"))
    }

    async fn write_sidecar(&self, artifact: &Artifact) -> Result<()> {
        let path = self.sidecar_path(artifact.id);
        let contents = serde_json::to_vec_pretty(&SidecarRecord::from(artifact))
            .map_err(|err| StoreError::sidecar(&path, err))?;
        write_staged(&path, &contents).await
    }

    /// File names in the artifact directory; empty if it does not exist.
    async fn list_directory(&self) -> Result<Vec<OsString>> {
        let directory = self.directory();
        let mut entries = match fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(directory, err)),
        };

        let mut file_names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::io(directory, err))?
        {
            file_names.push(entry.file_name());
        }
        Ok(file_names)
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("directory", &self.inner.directory)
            .finish_non_exhaustive()
    }
}

/// Writes `contents` next to `path` and renames it into place.
async fn write_staged(path: &Path, contents: &[u8]) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(STAGING_SUFFIX);
    let staging = PathBuf::from(staging);

    let written = match fs::write(&staging, contents).await {
        Ok(()) => fs::rename(&staging, path).await,
        Err(err) => Err(err),
    };

    if let Err(err) = written {
        if let Err(cleanup) = remove_if_exists(&staging).await {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %staging.display(),
                error = %cleanup,
                "Failed to remove staging file after a failed write"
            );
        }
        return Err(StoreError::io(path, err));
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::io(path, err)),
    }
}

async fn is_older_than(path: &Path, age: Duration) -> bool {
    let Ok(metadata) = fs::metadata(path).await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed >= age)
}
