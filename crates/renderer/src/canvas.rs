//! Owned true-colour pixel buffer.
//!
//! A [`Canvas`] is a row-major `Vec<u32>` of packed `0x00RRGGBB` pixels
//! together with the colour-space tag accumulated while painting.

use raster_common::{true_color, ColorSpace, RasterError, RasterResult};

/// Border colour of the "present but unrenderable" placeholder.
pub const PLACEHOLDER_BORDER: u32 = 0xc0c0c0;
/// Interior colour of the placeholder.
pub const PLACEHOLDER_FILL: u32 = 0xf0f0f0;

#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    color_space: ColorSpace,
}

impl Canvas {
    /// Black canvas tagged Monochrome.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: u32, height: u32, color: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
            color_space: ColorSpace::Monochrome,
        }
    }

    /// Wrap an existing row-major pixel vector.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> RasterResult<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RasterError::codec(format!(
                "pixel buffer holds {} pixels, expected {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            color_space: ColorSpace::Monochrome,
        })
    }

    /// Build from interleaved 8-bit RGB samples.
    pub fn from_rgb8(width: u32, height: u32, data: &[u8]) -> RasterResult<Self> {
        let pixels = data
            .chunks_exact(3)
            .map(|p| true_color(p[0], p[1], p[2]))
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    /// Build from 8-bit luminance samples.
    pub fn from_gray8(width: u32, height: u32, data: &[u8]) -> RasterResult<Self> {
        let pixels = data.iter().map(|&v| true_color(v, v, v)).collect();
        Self::from_pixels(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    /// Widen the tag after painting a tile of `tile` colour space.
    pub fn promote(&mut self, tile: ColorSpace) {
        self.color_space = self.color_space.promote(tile);
    }

    pub fn row(&self, y: u32) -> &[u32] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Set one pixel; coordinates outside the canvas are ignored.
    pub fn set(&mut self, x: i64, y: i64, color: u32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels[idx] = color;
        true
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    /// Paint `src` with its top-left corner at `(base_x, base_y)`.
    ///
    /// Destination pixels outside the canvas are skipped, as are source
    /// pixels equal to `transparent`. Returns the number of pixels written.
    pub fn copy_from(
        &mut self,
        src: &Canvas,
        base_x: i64,
        base_y: i64,
        transparent: Option<u32>,
    ) -> usize {
        let Some((x0, x1)) = clip_span(base_x, src.width, self.width) else {
            return 0;
        };
        let Some((y0, y1)) = clip_span(base_y, src.height, self.height) else {
            return 0;
        };

        let dst_width = self.width as usize;
        let mut written = 0;
        for sy in y0..y1 {
            let dy = (base_y + sy as i64) as usize;
            let dx0 = (base_x + x0 as i64) as usize;
            let src_row = &src.row(sy)[x0 as usize..x1 as usize];
            let dst_row = &mut self.pixels[dy * dst_width + dx0..dy * dst_width + dx0 + src_row.len()];
            for (dst, &pixel) in dst_row.iter_mut().zip(src_row) {
                if Some(pixel) == transparent {
                    continue;
                }
                *dst = pixel;
                written += 1;
            }
        }
        written
    }

    /// Paint the grey placeholder rectangle: a one-pixel border around a
    /// lighter interior, clipped to the canvas.
    pub fn draw_placeholder(&mut self, base_x: i64, base_y: i64, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let Some((x0, x1)) = clip_span(base_x, width, self.width) else {
            return;
        };
        let Some((y0, y1)) = clip_span(base_y, height, self.height) else {
            return;
        };

        let dst_width = self.width as usize;
        for ry in y0..y1 {
            let dy = (base_y + ry as i64) as usize;
            let edge_row = ry == 0 || ry == height - 1;
            for rx in x0..x1 {
                let dx = (base_x + rx as i64) as usize;
                let border = edge_row || rx == 0 || rx == width - 1;
                self.pixels[dy * dst_width + dx] = if border {
                    PLACEHOLDER_BORDER
                } else {
                    PLACEHOLDER_FILL
                };
            }
        }
    }
}

/// Visible `[start, end)` range of a span of `len` placed at `base` over a
/// destination of `limit`, in span-local coordinates.
fn clip_span(base: i64, len: u32, limit: u32) -> Option<(u32, u32)> {
    let start = (-base).max(0);
    let end = (limit as i64 - base).min(len as i64);
    if start >= end {
        return None;
    }
    Some((start as u32, end as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_monochrome() {
        let c = Canvas::filled(4, 3, 0x112233);
        assert_eq!(c.color_space(), ColorSpace::Monochrome);
        assert_eq!(c.pixels().len(), 12);
        assert!(c.pixels().iter().all(|&p| p == 0x112233));
    }

    #[test]
    fn test_get_set_bounds() {
        let mut c = Canvas::new(2, 2);
        assert!(c.set(1, 1, 7));
        assert!(!c.set(2, 0, 7));
        assert!(!c.set(-1, 0, 7));
        assert_eq!(c.get(1, 1), Some(7));
        assert_eq!(c.get(2, 2), None);
    }

    #[test]
    fn test_from_pixels_length_mismatch() {
        assert!(Canvas::from_pixels(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_copy_clips_negative_offsets() {
        let mut dst = Canvas::new(4, 4);
        let src = Canvas::filled(3, 3, 0xff0000);
        let written = dst.copy_from(&src, -2, -2, None);
        assert_eq!(written, 1);
        assert_eq!(dst.get(0, 0), Some(0xff0000));
        assert_eq!(dst.get(1, 0), Some(0));
    }

    #[test]
    fn test_copy_fully_outside() {
        let mut dst = Canvas::new(4, 4);
        let src = Canvas::filled(2, 2, 0xffffff);
        assert_eq!(dst.copy_from(&src, 10, 0, None), 0);
        assert_eq!(dst.copy_from(&src, 0, -2, None), 0);
    }

    #[test]
    fn test_copy_skips_transparent() {
        let mut dst = Canvas::filled(2, 1, 0x0000ff);
        let src = Canvas::from_pixels(2, 1, vec![0x00ff00, 0xffffff]).unwrap();
        dst.copy_from(&src, 0, 0, Some(0xffffff));
        assert_eq!(dst.pixels(), &[0x00ff00, 0x0000ff]);
    }

    #[test]
    fn test_placeholder_colors() {
        let mut c = Canvas::new(6, 6);
        c.draw_placeholder(1, 1, 4, 4);
        assert_eq!(c.get(0, 0), Some(0));
        assert_eq!(c.get(1, 1), Some(PLACEHOLDER_BORDER));
        assert_eq!(c.get(4, 2), Some(PLACEHOLDER_BORDER));
        assert_eq!(c.get(2, 2), Some(PLACEHOLDER_FILL));
        assert_eq!(c.get(5, 5), Some(0));
    }
}
