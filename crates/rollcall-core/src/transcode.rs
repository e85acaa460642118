//! Image transcoding into a size-bounded JPEG for network transfer.
//!
//! Every captured image is decoded, downscaled to a maximum width, flattened
//! to RGB (or kept as 8-bit luma for camera frames), and JPEG-encoded. If the
//! result exceeds the payload cap the image is re-encoded at lower quality.

use crate::types::CapturedImage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage};
use thiserror::Error;

const DEFAULT_MAX_WIDTH: u32 = 800;
const DEFAULT_QUALITY: u8 = 70;
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
/// Lowest quality tried when shrinking an oversized payload.
const QUALITY_FLOOR: u8 = 30;
const QUALITY_STEP: u8 = 10;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to decode source image: {0}")]
    Decode(String),
    #[error("failed to encode JPEG: {0}")]
    Encode(String),
    #[error("invalid base64 image: {0}")]
    InvalidBase64(String),
    #[error("grayscale frame {width}x{height} needs {expected} bytes, got {actual}")]
    EmptyFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("encoded payload is {bytes} bytes, above the {limit} byte limit")]
    TooLarge { bytes: usize, limit: usize },
}

#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    pub max_width: u32,
    /// JPEG quality, 1–100.
    pub quality: u8,
    /// Cap on the base64 text sent over the wire, not the raw JPEG.
    pub max_payload_bytes: usize,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_QUALITY,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl TranscodeOptions {
    /// Build options from a 0.0–1.0 compression factor.
    pub fn with_quality_factor(mut self, factor: f32) -> Self {
        self.quality = (factor * 100.0).round().clamp(1.0, 100.0) as u8;
        self
    }
}

/// JPEG-encoded image ready to be sent to a backend.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality the final encoding was produced at.
    pub quality: u8,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    /// Length of the padded base64 form produced by [`Self::to_base64`].
    pub fn base64_len(&self) -> usize {
        base64_len(self.jpeg.len())
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

fn base64_len(bytes: usize) -> usize {
    bytes.div_ceil(3) * 4
}

/// Strip a `data:<mime>;base64,` prefix and any line breaks.
pub fn clean_base64(input: &str) -> String {
    let payload = match input.split_once("base64,") {
        Some((_, rest)) => rest,
        None => input,
    };
    payload.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Decode, downscale and JPEG-encode a captured image.
pub fn transcode(
    source: &CapturedImage,
    opts: &TranscodeOptions,
) -> Result<EncodedImage, TranscodeError> {
    let decoded = decode(source)?;
    let scaled = downscale(decoded, opts.max_width);
    let (width, height) = (scaled.width(), scaled.height());

    let (pixels, color) = match scaled {
        DynamicImage::ImageLuma8(gray) => (gray.into_raw(), ExtendedColorType::L8),
        other => (other.to_rgb8().into_raw(), ExtendedColorType::Rgb8),
    };

    let mut quality = opts.quality.clamp(1, 100);
    loop {
        let jpeg = encode_jpeg(&pixels, width, height, color, quality)?;
        let payload = base64_len(jpeg.len());
        if payload <= opts.max_payload_bytes {
            tracing::debug!(width, height, quality, bytes = jpeg.len(), payload, "transcoded image");
            return Ok(EncodedImage {
                jpeg,
                width,
                height,
                quality,
            });
        }
        if quality <= QUALITY_FLOOR {
            return Err(TranscodeError::TooLarge {
                bytes: payload,
                limit: opts.max_payload_bytes,
            });
        }
        tracing::debug!(quality, payload, "payload above limit, lowering quality");
        quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
    }
}

fn decode(source: &CapturedImage) -> Result<DynamicImage, TranscodeError> {
    match source {
        CapturedImage::File(path) => {
            image::open(path).map_err(|e| TranscodeError::Decode(format!("{}: {e}", path.display())))
        }
        CapturedImage::Encoded(bytes) => {
            image::load_from_memory(bytes).map_err(|e| TranscodeError::Decode(e.to_string()))
        }
        CapturedImage::Base64(text) => {
            let bytes = STANDARD
                .decode(clean_base64(text))
                .map_err(|e| TranscodeError::InvalidBase64(e.to_string()))?;
            image::load_from_memory(&bytes).map_err(|e| TranscodeError::Decode(e.to_string()))
        }
        CapturedImage::Gray {
            width,
            height,
            pixels,
        } => {
            let expected = (*width as usize) * (*height as usize);
            if expected == 0 || pixels.len() < expected {
                return Err(TranscodeError::EmptyFrame {
                    width: *width,
                    height: *height,
                    expected,
                    actual: pixels.len(),
                });
            }
            GrayImage::from_raw(*width, *height, pixels[..expected].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or(TranscodeError::EmptyFrame {
                    width: *width,
                    height: *height,
                    expected,
                    actual: pixels.len(),
                })
        }
    }
}

/// Resize to `max_width` keeping aspect ratio. Never upscales.
fn downscale(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if max_width == 0 || w <= max_width {
        return img;
    }
    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    img.resize_exact(max_width, new_h, FilterType::Triangle)
}

fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
    quality: u8,
) -> Result<Vec<u8>, TranscodeError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(pixels, width, height, color)
        .map_err(|e| TranscodeError::Encode(e.to_string()))?;
    Ok(buf)
}
