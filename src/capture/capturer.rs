//! Region capture with placeholder fallback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::config::IMAGE_LOAD_TIMEOUT;
use crate::error::{Error, Result};

use super::placeholder;
use super::raster::{CapturedImage, ImageFormat, encode_data_url};
use super::region::{ScrollOffset, SelectedRegion};

// ============================================================================
// Constants
// ============================================================================

/// JPEG quality used when PNG export fails.
const FALLBACK_JPEG_QUALITY: u8 = 80;

// ============================================================================
// CaptureExclusions
// ============================================================================

/// Elements kept out of the rasterized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureExclusions {
    /// Extension-owned overlay element ids.
    pub overlay_ids: &'static [&'static str],
    /// Tags skipped entirely (would taint or crash the rasterizer).
    pub ignored_tags: &'static [&'static str],
    /// Tags hidden in the cloned document before rendering.
    pub hidden_tags: &'static [&'static str],
}

impl CaptureExclusions {
    /// Exclusions applied to every capture.
    pub const DEFAULT: Self = Self {
        overlay_ids: &["selection-overlay", "selection-box", "persistent-selection-box"],
        ignored_tags: &["IFRAME", "OBJECT", "EMBED"],
        hidden_tags: &["iframe", "canvas", "video", "object", "embed"],
    };

    /// Returns `true` if the element must be skipped by the rasterizer.
    #[must_use]
    pub fn ignores(&self, tag_name: &str, element_id: &str) -> bool {
        self.overlay_ids.contains(&element_id)
            || self
                .ignored_tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(tag_name))
    }

    /// Returns `true` if the element must be hidden in the cloned document.
    #[must_use]
    pub fn hides(&self, tag_name: &str) -> bool {
        self.hidden_tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(tag_name))
    }
}

impl Default for CaptureExclusions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// RasterRequest / Rasterizer
// ============================================================================

/// Rasterization parameters in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRequest {
    /// Scroll-adjusted region.
    pub region: SelectedRegion,
    /// Device pixel scale (always 1).
    pub scale: u32,
    /// Elements to skip or hide.
    pub exclusions: CaptureExclusions,
}

/// Renders part of a page into pixels.
///
/// Implemented by the page-side rendering engine. Failures (engine absent,
/// cross-origin taint, security-restricted page) are reported as errors and
/// turned into a placeholder by [`ImageCapturer`].
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Returns `false` when the rendering engine is not loaded on the page.
    fn is_available(&self) -> bool {
        true
    }

    /// Renders the requested region.
    async fn rasterize(&self, request: &RasterRequest) -> Result<RgbaImage>;
}

// ============================================================================
// ImageCapturer
// ============================================================================

/// Captures a page region to an encoded image.
///
/// [`capture`](Self::capture) never fails: any rasterization or encoding
/// failure yields a placeholder of the region's size.
#[derive(Clone)]
pub struct ImageCapturer {
    rasterizer: Arc<dyn Rasterizer>,
    load_timeout: Duration,
    host: Option<String>,
}

impl fmt::Debug for ImageCapturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCapturer")
            .field("load_timeout", &self.load_timeout)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl ImageCapturer {
    /// Creates a capturer around a rasterizer.
    #[must_use]
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            load_timeout: IMAGE_LOAD_TIMEOUT,
            host: None,
        }
    }

    /// Sets the page host name shown in placeholder notices.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the rasterization timeout.
    #[must_use]
    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Returns `true` when the rendering engine is present.
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.rasterizer.is_available()
    }

    /// Captures `region` at the current scroll position.
    pub async fn capture(&self, region: SelectedRegion, scroll: ScrollOffset) -> CapturedImage {
        let request = RasterRequest {
            region: region.scrolled(scroll),
            scale: 1,
            exclusions: CaptureExclusions::DEFAULT,
        };

        debug!(region = %request.region, "Capturing region");

        match self.rasterize(&request).await.and_then(|pixels| Self::encode(&pixels)) {
            Ok(data_url) => {
                debug!(len = data_url.len(), "Region captured");
                CapturedImage::captured(data_url)
            }
            Err(e) => {
                error!(error = %e, region = %request.region, "Region capture failed");
                placeholder::create(
                    region.width,
                    region.height,
                    self.host.as_deref(),
                    &e.to_string(),
                )
            }
        }
    }

    async fn rasterize(&self, request: &RasterRequest) -> Result<RgbaImage> {
        if !self.rasterizer.is_available() {
            return Err(Error::capture("rendering engine not available"));
        }

        timeout(self.load_timeout, self.rasterizer.rasterize(request))
            .await
            .map_err(|_| {
                Error::capture(format!(
                    "rendering timed out after {}ms",
                    self.load_timeout.as_millis()
                ))
            })?
    }

    fn encode(pixels: &RgbaImage) -> Result<String> {
        encode_data_url(pixels, ImageFormat::Png).or_else(|e| {
            warn!(error = %e, "PNG export failed, trying JPEG");
            encode_data_url(pixels, ImageFormat::jpeg(FALLBACK_JPEG_QUALITY))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
