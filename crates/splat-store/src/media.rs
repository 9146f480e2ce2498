//! Upload classification and file naming.
//!
//! Classification is a heuristic: the file extension wins when it is
//! recognised, then the MIME type prefix, and everything else is treated as
//! an image.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// File name used when an upload arrives without a usable one.
pub const FALLBACK_FILE_NAME: &str = "uploaded-image";

const POINT_CLOUD_EXTENSIONS: &[&str] = &["ply"];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "avif",
];

/// Broad kind of payload an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaCategory {
    /// A source photograph.
    Image,
    /// A Gaussian splat point cloud.
    PointCloud,
}

impl MediaCategory {
    /// Classifies an upload by file name, then MIME type.
    pub fn classify(file_name: &str, mime_type: &str) -> Self {
        if let Some(extension) = extension_of(file_name) {
            let extension = extension.to_ascii_lowercase();
            if POINT_CLOUD_EXTENSIONS.contains(&extension.as_str()) {
                return Self::PointCloud;
            }
            if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
                return Self::Image;
            }
        }

        let mime_type = mime_type.trim().to_ascii_lowercase();
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("model/") || mime_type.contains("ply") {
            Self::PointCloud
        } else {
            Self::Image
        }
    }

    /// MIME type recorded when the uploader supplied none.
    pub fn default_mime_type(self, extension: &str) -> &'static str {
        match self {
            Self::PointCloud => "application/octet-stream",
            Self::Image => match extension.trim_start_matches('.') {
                "png" => "image/png",
                "gif" => "image/gif",
                "bmp" => "image/bmp",
                "tif" | "tiff" => "image/tiff",
                "webp" => "image/webp",
                "heic" | "heif" => "image/heic",
                "avif" => "image/avif",
                _ => "image/jpeg",
            },
        }
    }
}

/// Detects an image format from its leading bytes.
///
/// Returns the extension with its leading dot. Unknown payloads are assumed
/// to be JPEG.
pub fn sniff_image_extension(bytes: &[u8]) -> &'static str {
    const HEIC_BRANDS: [&[u8]; 6] = [b"heic", b"heix", b"hevc", b"hevx", b"mif1", b"msf1"];
    const AVIF_BRANDS: [&[u8]; 2] = [b"avif", b"avis"];

    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return ".jpg";
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return ".png";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return ".gif";
    }
    if bytes.starts_with(b"BM") {
        return ".bmp";
    }
    if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        return ".tiff";
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return ".webp";
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if HEIC_BRANDS.contains(&brand) {
            return ".heic";
        }
        if AVIF_BRANDS.contains(&brand) {
            return ".avif";
        }
    }
    ".jpg"
}

/// Strips directory components and surrounding whitespace from a file name.
pub fn normalize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        FALLBACK_FILE_NAME.to_owned()
    } else {
        base.to_owned()
    }
}

/// Returns the extension of `file_name` without its dot, if any.
pub fn extension_of(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .filter(|extension| !extension.is_empty())
}

/// Returns the file name without its extension.
pub fn stem_of(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}

/// Normalizes an extension to `.lowercase` form.
///
/// Anything that is not a short alphanumeric token becomes `.bin`.
pub(crate) fn sanitize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 16
        && trimmed.bytes().all(|byte| byte.is_ascii_alphanumeric());

    if valid {
        format!(".{}", trimmed.to_ascii_lowercase())
    } else {
        ".bin".to_owned()
    }
}
