#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod job;
mod manager;

pub use config::{DEFAULT_JOB_TTL, JobManagerConfig};
pub use error::{JobError, Result};
pub use job::{GenerationJob, JobStatus, StatusUpdate};
pub use manager::{JobManager, SPLAT_MIME_TYPE, TRACING_TARGET};
