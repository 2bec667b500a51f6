use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Model input dimensions (grayscale).
const TARGET_WIDTH: u32 = 64;
const TARGET_HEIGHT: u32 = 64;

/// Incoming frame image, resolved exactly once at the engine boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum FramePayload {
    /// Encoded image bytes (PNG/JPEG/...).
    RawBytes(Vec<u8>),
    /// Base64-encoded image, as sent by browser capture.
    EncodedBase64(String),
    /// Path to an image on disk.
    FilePath(PathBuf),
}

/// A frame normalized for the classifier: grayscale, fixed size, pixel
/// values scaled to [0, 1].
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub pixels: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl FramePayload {
    /// Decode and preprocess the payload into classifier input.
    pub fn prepare(&self) -> EngineResult<PreparedFrame> {
        let bytes = match self {
            FramePayload::RawBytes(bytes) => bytes.clone(),
            FramePayload::EncodedBase64(encoded) => {
                // Tolerate data-URL prefixes from browser capture.
                let encoded = encoded
                    .rsplit_once(',')
                    .map(|(_, tail)| tail)
                    .unwrap_or(encoded.as_str());
                BASE64.decode(encoded).map_err(|err| {
                    EngineError::InvalidArgument(format!("invalid base64 frame: {err}"))
                })?
            }
            FramePayload::FilePath(path) => std::fs::read(path).map_err(|err| {
                EngineError::InvalidArgument(format!(
                    "failed to read frame from {}: {err}",
                    path.display()
                ))
            })?,
        };

        if bytes.is_empty() {
            return Err(EngineError::InvalidArgument("empty frame payload".into()));
        }

        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| EngineError::InvalidArgument(format!("undecodable frame: {err}")))?;

        let gray = decoded
            .resize_exact(TARGET_WIDTH, TARGET_HEIGHT, FilterType::Triangle)
            .into_luma8();

        let pixels = gray
            .pixels()
            .map(|pixel| f32::from(pixel.0[0]) / 255.0)
            .collect();

        Ok(PreparedFrame {
            pixels,
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([128u8]));
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn raw_bytes_prepare_to_target_size() {
        let frame = FramePayload::RawBytes(png_bytes()).prepare().unwrap();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 64);
        assert_eq!(frame.pixels.len(), 64 * 64);
        assert!(frame.pixels.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn base64_with_data_url_prefix_is_accepted() {
        let encoded = format!("data:image/png;base64,{}", BASE64.encode(png_bytes()));
        let frame = FramePayload::EncodedBase64(encoded).prepare().unwrap();
        assert_eq!(frame.pixels.len(), 64 * 64);
    }

    #[test]
    fn garbage_bytes_are_invalid_argument() {
        let err = FramePayload::RawBytes(vec![1, 2, 3]).prepare().unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn empty_payload_is_rejected() {
        let err = FramePayload::RawBytes(Vec::new()).prepare().unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
