//! Optional camera metadata carried by some splat payloads.

use serde::{Deserialize, Serialize};

use crate::header::{Encoding, PlyHeader, PropertyKind};
use crate::validate::POINT_ELEMENT;

/// Element group holding the source image width and height.
pub const IMAGE_SIZE_ELEMENT: &str = "image_size";

/// Element group holding the row-major 3x3 camera intrinsic matrix.
pub const INTRINSIC_ELEMENT: &str = "intrinsic";

/// Metadata summarised from a splat payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplatMetadata {
    pub point_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length_y: Option<f32>,
}

impl SplatMetadata {
    /// Source image dimensions, when both are known.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_width.zip(self.image_height)
    }
}

/// Extracts [`SplatMetadata`] from `bytes`.
///
/// Returns `None` when the header cannot be parsed, the encoding is not
/// binary little-endian, or there is no point element. Individual fields are
/// `None` when their element group is absent or its data cannot be located.
pub fn summarize(bytes: &[u8]) -> Option<SplatMetadata> {
    let header = PlyHeader::parse(bytes).ok()?;
    if header.encoding != Encoding::BinaryLittleEndian {
        return None;
    }
    let point_count = header.element(POINT_ELEMENT)?.count;

    let image_size = read_values(&header, bytes, IMAGE_SIZE_ELEMENT, 2);
    let intrinsic = read_values(&header, bytes, INTRINSIC_ELEMENT, 5);

    let (image_width, image_height) = match image_size {
        Some(values) => (to_dimension(values[0]), to_dimension(values[1])),
        None => (None, None),
    };
    let (focal_length_x, focal_length_y) = match intrinsic {
        Some(values) => (Some(values[0] as f32), Some(values[4] as f32)),
        None => (None, None),
    };

    Some(SplatMetadata {
        point_count,
        image_width,
        image_height,
        focal_length_x,
        focal_length_y,
    })
}

/// Reads the first `min_values` scalars stored in the named element group.
///
/// Values are read record by record, property by property, in declaration
/// order.
fn read_values(
    header: &PlyHeader,
    bytes: &[u8],
    element_name: &str,
    min_values: usize,
) -> Option<Vec<f64>> {
    let element = header.element(element_name)?;
    let region = header.region_of(element_name)?;

    let start = usize::try_from(region.offset).ok()?;
    let end = usize::try_from(region.end()?).ok()?;
    let data = bytes.get(start..end)?;

    let mut values = Vec::with_capacity(min_values);
    let mut cursor = 0usize;
    'records: for _ in 0..element.count {
        for property in &element.properties {
            let PropertyKind::Scalar(scalar) = property.kind else {
                return None;
            };
            values.push(scalar.read_le(data.get(cursor..)?)?);
            cursor += scalar.size() as usize;
            if values.len() >= min_values {
                break 'records;
            }
        }
    }

    (values.len() >= min_values).then_some(values)
}

fn to_dimension(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX)).then_some(value as u32)
}
