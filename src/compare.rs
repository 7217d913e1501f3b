//! Similarity Comparator.
//!
//! Scores two raster images of the same region as the percentage of pixels
//! whose RGB values lie within a fixed Euclidean distance of each other.
//! Alpha is ignored. The tolerance absorbs anti-aliasing and rendering
//! noise while still catching real content changes.
//!
//! | Step | Rule |
//! |------|------|
//! | Distance | `sqrt(dr² + dg² + db²)` per pixel |
//! | Match | distance < [`PIXEL_TOLERANCE`] |
//! | Score | `matching / total * 100`, rounded to 2 decimals |

use image::RgbaImage;
use tracing::{debug, warn};

use crate::capture::decode_data_url;
use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Maximum RGB distance (exclusive) for two pixels to count as matching.
pub const PIXEL_TOLERANCE: u32 = 30;

const TOLERANCE_SQUARED: u32 = PIXEL_TOLERANCE * PIXEL_TOLERANCE;

// ============================================================================
// Comparison
// ============================================================================

/// Returns the similarity of two images in percent, in `[0, 100]`.
///
/// Pixels are paired by coordinate. When the dimensions differ, the
/// denominator is the larger pixel count and pixels outside the overlap
/// count as mismatches, so the score stays symmetric. Two empty images
/// are identical.
#[must_use]
pub fn similarity(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let (aw, ah) = a.dimensions();
    let (bw, bh) = b.dimensions();

    let total = (u64::from(aw) * u64::from(ah)).max(u64::from(bw) * u64::from(bh));
    if total == 0 {
        return 100.0;
    }

    if (aw, ah) != (bw, bh) {
        warn!(
            reference_width = aw,
            reference_height = ah,
            current_width = bw,
            current_height = bh,
            "Comparing images of different dimensions"
        );
    }

    let width = aw.min(bw);
    let height = ah.min(bh);

    let mut matching: u64 = 0;
    for y in 0..height {
        for x in 0..width {
            let [r1, g1, b1, _] = a.get_pixel(x, y).0;
            let [r2, g2, b2, _] = b.get_pixel(x, y).0;

            let dr = u32::from(r1.abs_diff(r2));
            let dg = u32::from(g1.abs_diff(g2));
            let db = u32::from(b1.abs_diff(b2));

            if dr * dr + dg * dg + db * db < TOLERANCE_SQUARED {
                matching += 1;
            }
        }
    }

    round2(matching as f64 / total as f64 * 100.0)
}

/// Decodes two data URLs and compares them.
///
/// # Errors
///
/// Returns an error if either data URL cannot be decoded.
pub fn compare_data_urls(reference: &str, current: &str) -> Result<f64> {
    let reference = decode_data_url(reference)?;
    let current = decode_data_url(current)?;

    let score = similarity(&reference, &current);
    debug!(similarity = score, "Compared images");
    Ok(score)
}

#[inline]
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use image::Rgba;
    use proptest::prelude::*;

    use crate::capture::{ImageFormat, encode_data_url};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn test_identical_is_100() {
        let img = solid(10, 10, [120, 130, 140]);
        assert_eq!(similarity(&img, &img), 100.0);
    }

    #[test]
    fn test_tolerance_boundary() {
        let a = solid(1, 1, [0, 0, 0]);
        // distance 29 matches, 30 does not
        assert_eq!(similarity(&a, &solid(1, 1, [29, 0, 0])), 100.0);
        assert_eq!(similarity(&a, &solid(1, 1, [30, 0, 0])), 0.0);
        // sqrt(17² * 3) ≈ 29.4
        assert_eq!(similarity(&a, &solid(1, 1, [17, 17, 17])), 100.0);
        // sqrt(18² * 3) ≈ 31.2
        assert_eq!(similarity(&a, &solid(1, 1, [18, 18, 18])), 0.0);
    }

    #[test]
    fn test_alpha_ignored() {
        let a = RgbaImage::from_pixel(4, 4, Rgba([50, 50, 50, 255]));
        let b = RgbaImage::from_pixel(4, 4, Rgba([50, 50, 50, 0]));
        assert_eq!(similarity(&a, &b), 100.0);
    }

    #[test]
    fn test_ten_percent_changed() {
        let reference = solid(10, 10, [255, 255, 255]);
        let mut current = reference.clone();
        for x in 0..10 {
            current.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
        }
        assert_eq!(similarity(&reference, &current), 90.0);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let reference = solid(3, 1, [0, 0, 0]);
        let mut current = reference.clone();
        current.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        assert_eq!(similarity(&reference, &current), 66.67);
    }

    #[test]
    fn test_dimension_mismatch_counts_missing_pixels() {
        let small = solid(5, 5, [10, 10, 10]);
        let large = solid(10, 5, [10, 10, 10]);
        assert_eq!(similarity(&small, &large), 50.0);
        assert_eq!(similarity(&large, &small), 50.0);
    }

    #[test]
    fn test_empty_images() {
        let empty = RgbaImage::new(0, 0);
        assert_eq!(similarity(&empty, &empty), 100.0);
        assert_eq!(similarity(&empty, &solid(2, 2, [0, 0, 0])), 0.0);
    }

    #[test]
    fn test_compare_data_urls() {
        let img = solid(8, 8, [1, 2, 3]);
        let url = encode_data_url(&img, ImageFormat::Png).expect("encode");
        assert_eq!(compare_data_urls(&url, &url).expect("compare"), 100.0);
        assert!(compare_data_urls("garbage", &url).is_err());
    }

    fn arb_image() -> impl Strategy<Value = RgbaImage> {
        (1u32..8, 1u32..8).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h * 4) as usize).prop_map(move |raw| {
                RgbaImage::from_raw(w, h, raw).expect("buffer sized for dimensions")
            })
        })
    }

    proptest! {
        #[test]
        fn prop_self_similarity_is_100(img in arb_image()) {
            prop_assert_eq!(similarity(&img, &img), 100.0);
        }

        #[test]
        fn prop_symmetric(a in arb_image(), b in arb_image()) {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn prop_within_bounds(a in arb_image(), b in arb_image()) {
            let score = similarity(&a, &b);
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
