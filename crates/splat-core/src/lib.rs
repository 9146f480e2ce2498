#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod ids;
pub mod time;

pub use error::ErrorKind;
pub use ids::{ArtifactId, JobId};
