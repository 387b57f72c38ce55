//! Tests for tile encode/decode round-trips.
//!
//! Covers:
//! - Dimension preservation for every output format
//! - Exact pixel round-trips for lossless formats (PNG, TIFF, GIF)
//! - Bounded error for JPEG
//! - Colour-space tags reported on decode

use raster_common::{true_color, ColorSpace, ImageFormat};
use renderer::codec::{classify, decode, encode, encode_output, TileEncoding};
use renderer::Canvas;

// ============================================================================
// Helper functions
// ============================================================================

/// Smooth RGB gradient with well over 256 colours.
fn rgb_gradient(width: u32, height: u32) -> Canvas {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(true_color(
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
            ));
        }
    }
    Canvas::from_pixels(width, height, pixels)
        .unwrap()
        .with_color_space(ColorSpace::Rgb)
}

/// Grey ramp.
fn gray_ramp(width: u32, height: u32) -> Canvas {
    let pixels = (0..width * height)
        .map(|i| {
            let v = (i % 256) as u8;
            true_color(v, v, v)
        })
        .collect();
    Canvas::from_pixels(width, height, pixels)
        .unwrap()
        .with_color_space(ColorSpace::Grayscale)
}

/// Four-colour map-like pattern.
fn palette_blocks(width: u32, height: u32) -> Canvas {
    let colors = [0xd7191c, 0xfdae61, 0xabd9e9, 0x2c7bb6];
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(colors[((x / 8 + y / 8) % 4) as usize]);
        }
    }
    Canvas::from_pixels(width, height, pixels)
        .unwrap()
        .with_color_space(ColorSpace::Palette)
}

/// Black and white checkerboard.
fn checkerboard(width: u32, height: u32) -> Canvas {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(if (x + y) % 2 == 0 { 0x000000 } else { 0xffffff });
        }
    }
    Canvas::from_pixels(width, height, pixels).unwrap()
}

fn max_channel_error(a: &Canvas, b: &Canvas) -> u8 {
    a.pixels()
        .iter()
        .zip(b.pixels())
        .map(|(&p, &q)| {
            (0..3)
                .map(|shift| {
                    let x = ((p >> (shift * 8)) & 0xff) as i32;
                    let y = ((q >> (shift * 8)) & 0xff) as i32;
                    (x - y).unsigned_abs() as u8
                })
                .max()
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

// ============================================================================
// Dimension preservation
// ============================================================================

#[test]
fn test_every_encoding_preserves_dimensions() {
    let canvas = palette_blocks(37, 23);
    let encodings = [
        TileEncoding::TiffBilevel,
        TileEncoding::TiffPaletteRgb,
        TileEncoding::TiffGray,
        TileEncoding::TiffRgb,
        TileEncoding::PngPalette,
        TileEncoding::PngGray,
        TileEncoding::PngRgb,
        TileEncoding::GifPalette,
        TileEncoding::JpegGray,
        TileEncoding::JpegRgb,
    ];
    for encoding in encodings {
        let bytes = encode(&canvas, encoding, 75).unwrap();
        assert_eq!(ImageFormat::detect(&bytes), Some(encoding.format()), "{}", encoding);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            (decoded.width(), decoded.height()),
            (37, 23),
            "dimension mismatch for {}",
            encoding
        );
    }
}

// ============================================================================
// Lossless round-trips
// ============================================================================

#[test]
fn test_png_rgb_exact() {
    let canvas = rgb_gradient(64, 48);
    let decoded = decode(&encode(&canvas, TileEncoding::PngRgb, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Rgb);
}

#[test]
fn test_png_palette_exact() {
    let canvas = palette_blocks(40, 40);
    let decoded = decode(&encode(&canvas, TileEncoding::PngPalette, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Palette);
}

#[test]
fn test_png_palette_falls_back_to_rgb() {
    let canvas = rgb_gradient(64, 64);
    let bytes = encode(&canvas, TileEncoding::PngPalette, 0).unwrap();
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Rgb);
}

#[test]
fn test_png_gray_exact() {
    let canvas = gray_ramp(32, 16);
    let decoded = decode(&encode(&canvas, TileEncoding::PngGray, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Grayscale);
}

#[test]
fn test_tiff_rgb_exact() {
    let canvas = rgb_gradient(50, 30);
    let decoded = decode(&encode(&canvas, TileEncoding::TiffRgb, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Rgb);
}

#[test]
fn test_tiff_palette_recovers_tag() {
    let canvas = palette_blocks(24, 24);
    let decoded = decode(&encode(&canvas, TileEncoding::TiffPaletteRgb, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Palette);
}

#[test]
fn test_tiff_gray_exact() {
    let canvas = gray_ramp(20, 20);
    let decoded = decode(&encode(&canvas, TileEncoding::TiffGray, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Grayscale);
}

#[test]
fn test_tiff_bilevel_exact() {
    let canvas = checkerboard(16, 16);
    let decoded = decode(&encode(&canvas, TileEncoding::TiffBilevel, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Monochrome);
}

#[test]
fn test_gif_palette_exact() {
    let canvas = palette_blocks(33, 17);
    let decoded = decode(&encode(&canvas, TileEncoding::GifPalette, 0).unwrap()).unwrap();
    assert_eq!(decoded.pixels(), canvas.pixels());
    assert_eq!(decoded.color_space(), ColorSpace::Palette);
}

// ============================================================================
// Lossy round-trips
// ============================================================================

#[test]
fn test_jpeg_rgb_within_tolerance() {
    let canvas = Canvas::filled(64, 64, 0x4080c0).with_color_space(ColorSpace::Rgb);
    let decoded = decode(&encode(&canvas, TileEncoding::JpegRgb, 90).unwrap()).unwrap();
    assert_eq!(decoded.color_space(), ColorSpace::Rgb);
    assert!(max_channel_error(&canvas, &decoded) <= 8);
}

#[test]
fn test_jpeg_gray_decodes_as_grayscale() {
    let canvas = Canvas::filled(32, 32, 0x808080).with_color_space(ColorSpace::Grayscale);
    let decoded = decode(&encode(&canvas, TileEncoding::JpegGray, 75).unwrap()).unwrap();
    assert_eq!(decoded.color_space(), ColorSpace::Grayscale);
    assert!(max_channel_error(&canvas, &decoded) <= 4);
}

// ============================================================================
// Output selection
// ============================================================================

#[test]
fn test_encode_output_gif_rejects_rgb_canvas() {
    let canvas = rgb_gradient(64, 64);
    assert!(encode_output(&canvas, ImageFormat::Gif, 75).is_err());
}

#[test]
fn test_encode_output_monochrome_png_is_gray() {
    let canvas = checkerboard(64, 64);
    let bytes = encode_output(&canvas, ImageFormat::Png, 75).unwrap();
    assert_eq!(renderer::png::png_color_type(&bytes), Some(0));
}

#[test]
fn test_classify_matches_fixtures() {
    assert_eq!(classify(&checkerboard(8, 8)), ColorSpace::Monochrome);
    assert_eq!(classify(&gray_ramp(8, 8)), ColorSpace::Grayscale);
    assert_eq!(classify(&palette_blocks(32, 32)), ColorSpace::Palette);
    assert_eq!(classify(&rgb_gradient(64, 64)), ColorSpace::Rgb);
}
