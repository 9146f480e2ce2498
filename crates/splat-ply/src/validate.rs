//! Acceptance check for Gaussian splat payloads.

use crate::TRACING_TARGET;
use crate::error::{FormatError, Result};
use crate::header::{Encoding, PlyHeader};

/// Name of the element group holding one record per splat.
pub const POINT_ELEMENT: &str = "vertex";

/// Properties every splat record must declare.
pub const REQUIRED_POINT_FIELDS: [&str; 14] = [
    "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

/// Checks that `bytes` is a binary little-endian splat PLY.
///
/// The header must declare the supported encoding and a non-empty
/// [`POINT_ELEMENT`] carrying every name in [`REQUIRED_POINT_FIELDS`]. When
/// the point records' position can be computed from the header, the body must
/// also be long enough to hold them.
///
/// This is a pure function of its input.
pub fn validate(bytes: &[u8]) -> Result<PlyHeader> {
    let header = PlyHeader::parse(bytes).inspect_err(|err| {
        tracing::debug!(target: TRACING_TARGET, error = %err, "Rejected payload header");
    })?;

    if header.encoding != Encoding::BinaryLittleEndian {
        return Err(FormatError::UnsupportedEncoding {
            found: encoding_name(header.encoding).to_owned(),
        });
    }

    let points = header
        .element(POINT_ELEMENT)
        .ok_or_else(|| FormatError::MissingElement {
            name: POINT_ELEMENT.to_owned(),
        })?;

    let missing: Vec<String> = REQUIRED_POINT_FIELDS
        .iter()
        .filter(|field| !points.has_property(field))
        .map(|field| (*field).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(FormatError::MissingFields { fields: missing });
    }

    if points.count == 0 {
        return Err(FormatError::EmptyElement {
            name: POINT_ELEMENT.to_owned(),
        });
    }

    if let Some(expected) = header.region_of(POINT_ELEMENT).and_then(|region| region.end()) {
        let actual = bytes.len() as u64;
        if actual < expected {
            return Err(FormatError::TruncatedBody { expected, actual });
        }
    }

    tracing::trace!(
        target: TRACING_TARGET,
        points = points.count,
        elements = header.elements.len(),
        "Payload accepted"
    );

    Ok(header)
}

/// Returns `true` if `bytes` passes [`validate`].
pub fn is_valid(bytes: &[u8]) -> bool {
    validate(bytes).is_ok()
}

fn encoding_name(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Ascii => "ascii",
        Encoding::BinaryLittleEndian => "binary_little_endian",
        Encoding::BinaryBigEndian => "binary_big_endian",
    }
}
