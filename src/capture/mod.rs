//! Image Capturer: region geometry, rasterization, and encoding.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `region` | Selected rectangle and drag completion rules |
//! | `raster` | Data-URL codec and [`CapturedImage`] |
//! | `placeholder` | Fallback image for failed captures |
//! | `capturer` | [`Rasterizer`] seam and [`ImageCapturer`] |
//!
//! # Example
//!
//! ```ignore
//! let capturer = ImageCapturer::new(rasterizer).with_host("example.com");
//! let image = capturer.capture(region, page.scroll_offset()).await;
//! if image.is_placeholder() {
//!     // still a valid image of the same size
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod capturer;
mod placeholder;
mod raster;
mod region;

// ============================================================================
// Re-exports
// ============================================================================

pub use capturer::{CaptureExclusions, ImageCapturer, RasterRequest, Rasterizer};
pub use raster::{BLANK_PNG_DATA_URL, CapturedImage, ImageFormat, decode_data_url, encode_data_url};
pub use region::{
    MIN_PRESS_DURATION, MIN_SELECTION_SIZE, Point, ScrollOffset, SelectedRegion, SelectionGesture,
    SelectionRejection,
};
