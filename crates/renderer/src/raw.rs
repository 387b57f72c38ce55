//! Raw pixel array export.

use raster_common::color::{blue, green, red};
use raster_common::RawFormat;

use crate::canvas::Canvas;

/// Flatten `canvas` into interleaved bytes of `format`.
///
/// Alpha is 0 for pixels equal to `transparent` and 255 otherwise.
pub fn to_raw(canvas: &Canvas, format: RawFormat, transparent: Option<u32>) -> Vec<u8> {
    let mut out = Vec::with_capacity(canvas.pixels().len() * format.bytes_per_pixel());
    for &p in canvas.pixels() {
        let (r, g, b) = (red(p), green(p), blue(p));
        let a = if Some(p) == transparent { 0 } else { 255 };
        match format {
            RawFormat::Rgb => out.extend_from_slice(&[r, g, b]),
            RawFormat::Rgba => out.extend_from_slice(&[r, g, b, a]),
            RawFormat::Argb => out.extend_from_slice(&[a, r, g, b]),
            RawFormat::Bgr => out.extend_from_slice(&[b, g, r]),
            RawFormat::Bgra => out.extend_from_slice(&[b, g, r, a]),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layouts() {
        let c = Canvas::from_pixels(1, 1, vec![0x102030]).unwrap();
        assert_eq!(to_raw(&c, RawFormat::Rgb, None), vec![0x10, 0x20, 0x30]);
        assert_eq!(to_raw(&c, RawFormat::Bgr, None), vec![0x30, 0x20, 0x10]);
        assert_eq!(to_raw(&c, RawFormat::Rgba, None), vec![0x10, 0x20, 0x30, 255]);
        assert_eq!(to_raw(&c, RawFormat::Argb, None), vec![255, 0x10, 0x20, 0x30]);
        assert_eq!(to_raw(&c, RawFormat::Bgra, None), vec![0x30, 0x20, 0x10, 255]);
    }

    #[test]
    fn test_transparent_alpha() {
        let c = Canvas::from_pixels(2, 1, vec![0xffffff, 0x000000]).unwrap();
        let raw = to_raw(&c, RawFormat::Rgba, Some(0xffffff));
        assert_eq!(raw[3], 0);
        assert_eq!(raw[7], 255);
    }
}
