//! Request and response types, and their JSON wire form.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpstreamError};
use crate::tier::GpuTier;

/// A request to turn one source image into a splat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Encoded source image.
    pub image: Bytes,
    /// File name the image was uploaded under.
    pub file_name: String,
    pub tier: GpuTier,
}

impl GenerateRequest {
    /// Creates a request on the default tier.
    pub fn new(image: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            file_name: file_name.into(),
            tier: GpuTier::default(),
        }
    }

    /// Selects the GPU tier.
    #[must_use]
    pub fn with_tier(mut self, tier: GpuTier) -> Self {
        self.tier = tier;
        self
    }

    /// File name of the expected output, `<stem>.ply`.
    pub fn default_output_name(&self) -> String {
        format!("{}.ply", file_stem(&self.file_name))
    }

    /// Serializes the request body.
    pub fn to_wire(&self) -> WireRequest<'_> {
        WireRequest {
            image_bytes_base64: STANDARD.encode(&self.image),
            filename: &self.file_name,
            gpu_tier: self.tier,
        }
    }
}

/// A generated splat.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    /// File name the backend gave the output.
    pub file_name: String,
    /// PLY payload. Not yet validated.
    pub bytes: Bytes,
    /// Time the backend reports having spent, in milliseconds.
    pub elapsed_ms: f64,
}

/// JSON body sent to the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest<'a> {
    pub image_bytes_base64: String,
    pub filename: &'a str,
    pub gpu_tier: GpuTier,
}

/// JSON body received from the backend, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    #[serde(default)]
    pub output_filename: Option<String>,
    #[serde(default)]
    pub ply_bytes_base64: Option<String>,
    #[serde(default)]
    pub elapsed_ms: Option<f64>,
}

impl WireResponse {
    /// Parses a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|err| UpstreamError::schema(err.to_string()))
    }

    /// Checks every field and decodes the payload.
    ///
    /// A missing file name defaults to the request's `<stem>.ply`, and a
    /// missing elapsed time to the `measured` round trip.
    pub fn decode(self, request: &GenerateRequest, measured: Duration) -> Result<GenerateResponse> {
        let encoded = self
            .ply_bytes_base64
            .ok_or_else(|| UpstreamError::schema("plyBytesBase64 is missing"))?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| UpstreamError::schema(format!("plyBytesBase64 is not base64: {err}")))?;
        if bytes.is_empty() {
            return Err(UpstreamError::schema("plyBytesBase64 is empty"));
        }

        let elapsed_ms = match self.elapsed_ms {
            Some(elapsed) if elapsed.is_finite() && elapsed >= 0.0 => elapsed,
            Some(elapsed) => {
                return Err(UpstreamError::schema(format!(
                    "elapsedMs must be a non-negative number, got {elapsed}"
                )));
            }
            None => measured.as_secs_f64() * 1000.0,
        };

        let file_name = self
            .output_filename
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| request.default_output_name());

        Ok(GenerateResponse {
            file_name,
            bytes: Bytes::from(bytes),
            elapsed_ms,
        })
    }
}

/// Encodes a generated payload the way the backend does. Used by the mock.
pub(crate) fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Base name of `file_name` without directories or extension.
pub(crate) fn file_stem(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name).trim();
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ if base.is_empty() => "output",
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![0xff, 0xd8, 0xff], "photos/cat.jpg").with_tier(GpuTier::L4)
    }

    #[test]
    fn test_request_wire_form() {
        let json = serde_json::to_value(request().to_wire()).unwrap();
        assert_eq!(json["imageBytesBase64"], "/9j/");
        assert_eq!(json["filename"], "photos/cat.jpg");
        assert_eq!(json["gpuTier"], "l4");
    }

    #[test]
    fn test_decode_complete_response() {
        let wire = WireResponse::from_slice(
            br#"{"outputFilename": "cat.ply", "plyBytesBase64": "cGx5", "elapsedMs": 1234.5}"#,
        )
        .unwrap();
        let response = wire.decode(&request(), Duration::from_secs(9)).unwrap();
        assert_eq!(response.file_name, "cat.ply");
        assert_eq!(&response.bytes[..], b"ply");
        assert_eq!(response.elapsed_ms, 1234.5);
    }

    #[test]
    fn test_decode_fills_defaults() {
        let wire = WireResponse::from_slice(br#"{"plyBytesBase64": "cGx5"}"#).unwrap();
        let response = wire.decode(&request(), Duration::from_millis(250)).unwrap();
        assert_eq!(response.file_name, "cat.ply");
        assert_eq!(response.elapsed_ms, 250.0);
    }

    #[test]
    fn test_decode_rejects_bad_fields() {
        let cases: [&[u8]; 4] = [
            br#"{}"#,
            br#"{"plyBytesBase64": ""}"#,
            br#"{"plyBytesBase64": "***"}"#,
            br#"{"plyBytesBase64": "cGx5", "elapsedMs": -1}"#,
        ];
        for body in cases {
            let err = WireResponse::from_slice(body)
                .unwrap()
                .decode(&request(), Duration::ZERO)
                .unwrap_err();
            assert!(matches!(err, UpstreamError::Schema { .. }), "{err}");
        }
    }

    #[test]
    fn test_from_slice_rejects_non_json() {
        assert!(matches!(
            WireResponse::from_slice(b"<html>"),
            Err(UpstreamError::Schema { .. })
        ));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("dir/cat.jpg"), "cat");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem(""), "output");
    }
}
