//! Binary little-endian splat PLY writer.

use std::fmt::Write as _;

use crate::summary::{IMAGE_SIZE_ELEMENT, INTRINSIC_ELEMENT};
use crate::validate::{POINT_ELEMENT, REQUIRED_POINT_FIELDS};

/// One Gaussian splat record.
///
/// Field order matches [`REQUIRED_POINT_FIELDS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplatPoint {
    pub position: [f32; 3],
    /// Zeroth-order spherical harmonic colour coefficients.
    pub color_dc: [f32; 3],
    /// Pre-sigmoid opacity.
    pub opacity: f32,
    /// Log-space scale per axis.
    pub scale: [f32; 3],
    /// Rotation quaternion, `w` first.
    pub rotation: [f32; 4],
}

impl SplatPoint {
    /// A small, neutral grey splat at the given position.
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            color_dc: [0.0; 3],
            opacity: 0.0,
            scale: [-4.6; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    fn fields(&self) -> [f32; 14] {
        let [x, y, z] = self.position;
        let [r, g, b] = self.color_dc;
        let [sx, sy, sz] = self.scale;
        let [qw, qx, qy, qz] = self.rotation;
        [x, y, z, r, g, b, self.opacity, sx, sy, sz, qw, qx, qy, qz]
    }
}

/// Builds binary splat payloads accepted by [`validate`](crate::validate).
#[derive(Debug, Clone, Default)]
pub struct PlyWriter {
    comments: Vec<String>,
    points: Vec<SplatPoint>,
    intrinsic: Option<[f32; 9]>,
    image_size: Option<(u32, u32)>,
}

impl PlyWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    /// Appends a splat record.
    #[must_use]
    pub fn with_point(mut self, point: SplatPoint) -> Self {
        self.points.push(point);
        self
    }

    /// Adds the row-major 3x3 camera intrinsic matrix group.
    #[must_use]
    pub fn with_intrinsic(mut self, matrix: [f32; 9]) -> Self {
        self.intrinsic = Some(matrix);
        self
    }

    /// Adds the source image dimensions group.
    #[must_use]
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    /// Serialises the header and binary body.
    pub fn build(&self) -> Vec<u8> {
        let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
        for comment in &self.comments {
            let _ = writeln!(header, "comment {comment}");
        }

        let _ = writeln!(header, "element {POINT_ELEMENT} {}", self.points.len());
        for field in REQUIRED_POINT_FIELDS {
            let _ = writeln!(header, "property float {field}");
        }
        if self.intrinsic.is_some() {
            let _ = writeln!(header, "element {INTRINSIC_ELEMENT} 9");
            let _ = writeln!(header, "property float {INTRINSIC_ELEMENT}");
        }
        if self.image_size.is_some() {
            let _ = writeln!(header, "element {IMAGE_SIZE_ELEMENT} 2");
            let _ = writeln!(header, "property uint {IMAGE_SIZE_ELEMENT}");
        }
        header.push_str("end_header\n");

        let mut bytes = header.into_bytes();
        bytes.reserve(self.points.len() * REQUIRED_POINT_FIELDS.len() * 4 + 44);

        for point in &self.points {
            for value in point.fields() {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        if let Some(matrix) = self.intrinsic {
            for value in matrix {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        if let Some((width, height)) = self.image_size {
            bytes.extend_from_slice(&width.to_le_bytes());
            bytes.extend_from_slice(&height.to_le_bytes());
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PlyHeader;

    #[test]
    fn test_body_length_matches_header() {
        let bytes = PlyWriter::new()
            .with_comment("generated")
            .with_point(SplatPoint::at(1.0, 2.0, 3.0))
            .with_image_size(4, 3)
            .build();

        let header = PlyHeader::parse(&bytes).unwrap();
        assert_eq!(header.comments, ["generated"]);
        assert_eq!(bytes.len(), header.header_len + 14 * 4 + 2 * 4);
    }

    #[test]
    fn test_first_record_holds_position() {
        let bytes = PlyWriter::new()
            .with_point(SplatPoint::at(0.0, 0.0, 2.0))
            .build();
        let header = PlyHeader::parse(&bytes).unwrap();

        let z_offset = header.header_len + 8;
        let z = f32::from_le_bytes(bytes[z_offset..z_offset + 4].try_into().unwrap());
        assert_eq!(z, 2.0);
    }
}
