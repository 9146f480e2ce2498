#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod artifact;
mod config;
mod error;
mod media;
mod store;
mod sweeper;

pub use artifact::{Artifact, SIDECAR_SUFFIX};
pub use config::{
    ArtifactStoreConfig, DEFAULT_ARTIFACT_DIR, DEFAULT_ARTIFACT_TTL, DEFAULT_MAX_IMAGE_BYTES,
    DEFAULT_MAX_POINT_CLOUD_BYTES, DEFAULT_PUBLIC_BASE_URL, DEFAULT_SWEEP_INTERVAL,
};
pub use error::{Result, StoreError};
pub use media::{
    FALLBACK_FILE_NAME, MediaCategory, extension_of, normalize_file_name, sniff_image_extension,
    stem_of,
};
pub use store::{ArtifactStore, TRACING_TARGET};
