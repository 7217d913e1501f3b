//! Raster images and their data-URL form.
//!
//! Reference images travel through storage and messaging as
//! `data:image/...;base64,` URLs, the same shape a canvas export produces.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// A 1x1 transparent PNG, used when nothing else can be encoded.
pub const BLANK_PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Data URLs at or below this length are treated as failed exports.
const MIN_DATA_URL_LEN: usize = 100;

// ============================================================================
// ImageFormat
// ============================================================================

/// Encoding used for a data URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format with quality (0-100).
    Jpeg(u8),
}

impl ImageFormat {
    /// Creates JPEG format with quality (0-100).
    #[inline]
    #[must_use]
    pub fn jpeg(quality: u8) -> Self {
        Self::Jpeg(quality.min(100))
    }

    /// Returns the MIME type for this format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg(_) => "image/jpeg",
        }
    }
}

// ============================================================================
// CapturedImage
// ============================================================================

/// Result of a region capture.
///
/// Always holds a decodable data URL. When rasterization failed,
/// `fallback_notice` describes the failure; the placeholder pixels show
/// the same notice and the site host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Encoded image.
    pub data_url: String,
    /// Set when the image is a placeholder.
    pub fallback_notice: Option<String>,
}

impl CapturedImage {
    /// Wraps a successfully rasterized image.
    #[inline]
    #[must_use]
    pub fn captured(data_url: String) -> Self {
        Self {
            data_url,
            fallback_notice: None,
        }
    }

    /// Wraps a placeholder image.
    #[inline]
    #[must_use]
    pub fn placeholder(data_url: String, notice: impl Into<String>) -> Self {
        Self {
            data_url,
            fallback_notice: Some(notice.into()),
        }
    }

    /// Returns `true` if this is a placeholder.
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.fallback_notice.is_some()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes pixels as a data URL.
///
/// # Errors
///
/// Returns [`Error::Image`] if the encoder fails, or
/// [`Error::CaptureFailure`] if the result is implausibly short.
pub fn encode_data_url(pixels: &RgbaImage, format: ImageFormat) -> Result<String> {
    let mut bytes = Cursor::new(Vec::new());

    let (width, height) = pixels.dimensions();

    match format {
        ImageFormat::Png => {
            PngEncoder::new(&mut bytes).write_image(
                pixels.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        ImageFormat::Jpeg(quality) => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    let data_url = format!(
        "data:{};base64,{}",
        format.mime_type(),
        Base64Standard.encode(bytes.into_inner())
    );

    if data_url.len() <= MIN_DATA_URL_LEN {
        return Err(Error::capture(format!(
            "{} export produced only {} bytes",
            format.mime_type(),
            data_url.len()
        )));
    }

    Ok(data_url)
}

/// Decodes a `data:image/...;base64,` URL into RGBA pixels.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for a malformed URL, or [`Error::Image`] if
/// the payload is not a decodable image.
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage> {
    let payload = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| Error::protocol("not a base64 data URL"))?;

    let bytes = Base64Standard
        .decode(payload)
        .map_err(|e| Error::protocol(format!("Failed to decode base64: {e}")))?;

    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 5) as u8, ((x + y) * 3) as u8, 255])
        })
    }

    #[test]
    fn test_png_data_url_preserves_pixels() {
        let pixels = gradient(24, 16);
        let data_url = encode_data_url(&pixels, ImageFormat::Png).expect("encode");
        assert!(data_url.starts_with("data:image/png;base64,"));

        let decoded = decode_data_url(&data_url).expect("decode");
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_jpeg_data_url_keeps_dimensions() {
        let pixels = gradient(32, 32);
        let data_url = encode_data_url(&pixels, ImageFormat::jpeg(80)).expect("encode");
        assert!(data_url.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_data_url(&data_url).expect("decode");
        assert_eq!(decoded.dimensions(), (32, 32));
    }

    #[test]
    fn test_blank_png_decodes() {
        let decoded = decode_data_url(BLANK_PNG_DATA_URL).expect("decode");
        assert_eq!(decoded.dimensions(), (1, 1));
    }

    #[test]
    fn test_decode_rejects_empty_canvas_export() {
        assert!(matches!(decode_data_url("data:,"), Err(Error::Protocol { .. })));
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        assert_eq!(ImageFormat::jpeg(250), ImageFormat::Jpeg(100));
    }
}
