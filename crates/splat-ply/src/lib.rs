#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod header;
mod summary;
mod validate;
mod writer;

pub use error::{FormatError, Result};
pub use header::{
    Element, Encoding, MAX_HEADER_BYTES, PlyHeader, Property, PropertyKind, Region, ScalarType,
};
pub use summary::{IMAGE_SIZE_ELEMENT, INTRINSIC_ELEMENT, SplatMetadata, summarize};
pub use validate::{POINT_ELEMENT, REQUIRED_POINT_FIELDS, is_valid, validate};
pub use writer::{PlyWriter, SplatPoint};

/// Tracing target for payload validation.
pub const TRACING_TARGET: &str = "splat_ply::validate";
