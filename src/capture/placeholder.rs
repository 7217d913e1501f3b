//! Placeholder image used when a region cannot be rasterized.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use tracing::{error, warn};

use super::raster::{BLANK_PNG_DATA_URL, CapturedImage, ImageFormat, encode_data_url};

// ============================================================================
// Constants
// ============================================================================

/// Placeholder background (#f0f0f0).
const BACKGROUND: Rgba<u8> = Rgba([0xf0, 0xf0, 0xf0, 0xff]);

/// Placeholder border (#ff6b6b).
const BORDER: Rgba<u8> = Rgba([0xff, 0x6b, 0x6b, 0xff]);

/// Border thickness in pixels.
const BORDER_WIDTH: u32 = 3;

/// Notice text colour (#333333).
const NOTICE_COLOR: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 0xff]);

/// Site line colour (#999999).
const SITE_COLOR: Rgba<u8> = Rgba([0x99, 0x99, 0x99, 0xff]);

/// Lines drawn around the vertical centre, 20 px apart.
const NOTICE_LINES: [&str; 3] = [
    "Unable to capture the selected area",
    "Try a different area",
    "or another website",
];

/// Glyph cell size of the bitmap font.
const GLYPH_SIZE: u32 = 8;

/// Vertical distance between notice lines.
const LINE_SPACING: i64 = 20;

/// JPEG quality for the second encoding attempt.
const FALLBACK_JPEG_QUALITY: u8 = 80;

// ============================================================================
// Placeholder
// ============================================================================

/// Builds the notice attached to a placeholder.
#[must_use]
pub fn notice_for(host: Option<&str>, reason: &str) -> String {
    format!(
        "Unable to capture the selected area ({reason}). \
         Try a different area or another website. Site: {}",
        site_name(host)
    )
}

fn site_name(host: Option<&str>) -> &str {
    host.filter(|h| !h.is_empty()).unwrap_or("unknown site")
}

/// Draws the placeholder pixels: background, notice lines, site line and
/// a red frame.
#[must_use]
pub fn render(width: u32, height: u32, host: Option<&str>) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let mut pixels = RgbaImage::from_pixel(width, height, BACKGROUND);

    let center_x = i64::from(width / 2);
    let center_y = i64::from(height / 2);

    for (line, offset) in NOTICE_LINES.iter().zip([-LINE_SPACING, 0, LINE_SPACING]) {
        draw_text_centered(&mut pixels, center_x, center_y + offset, line, NOTICE_COLOR);
    }

    let site = format!("Site: {}", site_name(host));
    let site_y = i64::from(height) - LINE_SPACING;
    draw_text_centered(&mut pixels, center_x, site_y, &site, SITE_COLOR);

    for (x, y, pixel) in pixels.enumerate_pixels_mut() {
        let on_border = x < BORDER_WIDTH
            || y < BORDER_WIDTH
            || x >= width.saturating_sub(BORDER_WIDTH)
            || y >= height.saturating_sub(BORDER_WIDTH);
        if on_border {
            *pixel = BORDER;
        }
    }

    pixels
}

/// Draws one line of bitmap text centred on `(center_x, center_y)`.
///
/// Glyphs outside the image are clipped; characters missing from the
/// font render as `?`.
fn draw_text_centered(
    pixels: &mut RgbaImage,
    center_x: i64,
    center_y: i64,
    text: &str,
    color: Rgba<u8>,
) {
    let cell = i64::from(GLYPH_SIZE);
    let text_width = text.chars().count() as i64 * cell;

    let mut cursor_x = center_x - text_width / 2;
    let top = center_y - cell / 2;

    for ch in text.chars() {
        if let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) {
            for (row, bits) in (0_i64..).zip(glyph) {
                for col in 0..cell {
                    if (bits >> col) & 1 == 0 {
                        continue;
                    }

                    let (x, y) = (cursor_x + col, top + row);
                    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y))
                        && x < pixels.width()
                        && y < pixels.height()
                    {
                        pixels.put_pixel(x, y, color);
                    }
                }
            }
        }
        cursor_x += cell;
    }
}

/// Creates an encoded placeholder of the given size.
///
/// Never fails: PNG first, then JPEG, then a 1x1 transparent PNG.
#[must_use]
pub fn create(width: u32, height: u32, host: Option<&str>, reason: &str) -> CapturedImage {
    let notice = notice_for(host, reason);
    warn!(width, height, notice = %notice, "Using placeholder image");

    let pixels = render(width, height, host);

    let data_url = encode_data_url(&pixels, ImageFormat::Png)
        .or_else(|e| {
            warn!(error = %e, "Placeholder PNG export failed, trying JPEG");
            encode_data_url(&pixels, ImageFormat::jpeg(FALLBACK_JPEG_QUALITY))
        })
        .unwrap_or_else(|e| {
            error!(error = %e, "Placeholder export failed, using blank image");
            BLANK_PNG_DATA_URL.to_string()
        });

    CapturedImage::placeholder(data_url, notice)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::capture::raster::decode_data_url;

    /// Counts non-background pixels strictly inside the frame.
    fn inked_interior(pixels: &RgbaImage) -> usize {
        let (width, height) = pixels.dimensions();
        pixels
            .enumerate_pixels()
            .filter(|(x, y, _)| {
                *x >= BORDER_WIDTH
                    && *y >= BORDER_WIDTH
                    && *x < width - BORDER_WIDTH
                    && *y < height - BORDER_WIDTH
            })
            .filter(|(_, _, p)| **p != BACKGROUND)
            .count()
    }

    #[test]
    fn test_render_frame_and_fill() {
        let pixels = render(20, 10, None);
        assert_eq!(pixels.dimensions(), (20, 10));
        assert_eq!(*pixels.get_pixel(0, 0), BORDER);
        assert_eq!(*pixels.get_pixel(19, 9), BORDER);
        assert_eq!(*pixels.get_pixel(2, 5), BORDER);
    }

    #[test]
    fn test_create_keeps_region_size() {
        let image = create(40, 30, Some("example.com"), "engine missing");
        assert!(image.is_placeholder());

        let decoded = decode_data_url(&image.data_url).expect("decode");
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_notice_is_drawn_into_pixels() {
        let image = create(300, 120, Some("example.com"), "tainted canvas");
        let decoded = decode_data_url(&image.data_url).expect("decode");

        assert!(inked_interior(&decoded) > 0, "placeholder interior is blank");
        assert!(decoded.pixels().any(|p| *p == NOTICE_COLOR));
        assert!(decoded.pixels().any(|p| *p == SITE_COLOR));
    }

    #[test]
    fn test_site_line_depends_on_host() {
        let known = render(300, 120, Some("example.com"));
        let unknown = render(300, 120, None);
        assert_ne!(known, unknown);
    }

    #[test]
    fn test_notice_mentions_site() {
        let notice = notice_for(Some("example.com"), "tainted canvas");
        assert!(notice.contains("example.com"));
        assert!(notice.contains("tainted canvas"));
        assert!(notice_for(None, "x").contains("unknown site"));
        assert!(notice_for(Some(""), "x").contains("unknown site"));
    }
}
