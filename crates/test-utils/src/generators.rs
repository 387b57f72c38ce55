//! Pixel pattern generators.
//!
//! Patterns are predictable so tests can check that a pixel ended up where
//! it should after tiling, compositing or resampling.

use raster_common::color::{blue, green, red, true_color};

/// Pixel whose channels encode its own position.
///
/// Red and green carry the low 8 bits of `x` and `y`; blue packs the next
/// 4 bits of each, so positions are unique up to 4096 x 4096.
pub fn coordinate_color(x: u32, y: u32) -> u32 {
    let high = (((x >> 8) & 0xf) << 4) | ((y >> 8) & 0xf);
    true_color((x & 0xff) as u8, (y & 0xff) as u8, high as u8)
}

/// Inverse of [`coordinate_color`].
pub fn decode_coordinate(color: u32) -> (u32, u32) {
    let high = blue(color) as u32;
    let x = ((high >> 4) << 8) | red(color) as u32;
    let y = ((high & 0xf) << 8) | green(color) as u32;
    (x, y)
}

/// Row-major [`coordinate_color`] pattern.
///
/// ```
/// use test_utils::{coordinate_pattern, decode_coordinate};
///
/// let pixels = coordinate_pattern(300, 2);
/// assert_eq!(decode_coordinate(pixels[300 + 299]), (299, 1));
/// ```
pub fn coordinate_pattern(width: u32, height: u32) -> Vec<u32> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(coordinate_color(x, y));
        }
    }
    pixels
}

/// Grey diagonal ramp: level `(x + 2y) mod 256`.
pub fn gray_pattern(width: u32, height: u32) -> Vec<u32> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x + 2 * y) % 256) as u8;
            pixels.push(true_color(v, v, v));
        }
    }
    pixels
}

/// Two-colour checkerboard with square cells of `cell` pixels.
pub fn checkerboard(width: u32, height: u32, cell: u32, a: u32, b: u32) -> Vec<u32> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(if (x / cell + y / cell) % 2 == 0 { a } else { b });
        }
    }
    pixels
}

/// Horizontal bands cycling through `colors`, `band` rows each.
pub fn banded_pattern(width: u32, height: u32, band: u32, colors: &[u32]) -> Vec<u32> {
    let band = band.max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let color = if colors.is_empty() {
            0
        } else {
            colors[(y / band) as usize % colors.len()]
        };
        pixels.extend(std::iter::repeat(color).take(width as usize));
    }
    pixels
}

/// Distinct solid colour for the tile at `(col, row)` of a seeded grid.
pub fn tile_color(col: u32, row: u32) -> u32 {
    true_color(
        (40 + col * 50 % 200) as u8,
        (40 + row * 50 % 200) as u8,
        128,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_roundtrip() {
        for &(x, y) in &[(0, 0), (255, 1), (256, 0), (4095, 4095), (1234, 567)] {
            assert_eq!(decode_coordinate(coordinate_color(x, y)), (x, y));
        }
    }

    #[test]
    fn test_gray_pattern_is_grey() {
        for p in gray_pattern(16, 16) {
            assert_eq!(red(p), green(p));
            assert_eq!(green(p), blue(p));
        }
    }

    #[test]
    fn test_checkerboard_cells() {
        let p = checkerboard(4, 4, 2, 1, 2);
        assert_eq!(p[0], 1);
        assert_eq!(p[2], 2);
        assert_eq!(p[4 * 2], 2);
        assert_eq!(p[4 * 2 + 2], 1);
    }

    #[test]
    fn test_banded_pattern_rows() {
        let p = banded_pattern(2, 4, 2, &[7, 9]);
        assert_eq!(p, vec![7, 7, 7, 7, 9, 9, 9, 9]);
    }

    #[test]
    fn test_tile_colors_differ() {
        assert_ne!(tile_color(0, 0), tile_color(1, 0));
        assert_ne!(tile_color(0, 0), tile_color(0, 1));
    }
}
