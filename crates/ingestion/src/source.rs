//! Source raster abstraction.

use raster_common::{ColorSpace, RasterError};
use renderer::{Canvas, GeoReference};

use crate::error::{IngestionError, Result};

/// Affine pixel-to-map transform.
///
/// `x = c + a*col + b*row`, `y = f + d*col + e*row`; north-up rasters have
/// `b = d = 0` and a negative `e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_x_size: f64, pixel_y_size: f64) -> Self {
        Self {
            a: pixel_x_size,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -pixel_y_size,
            f: origin_y,
        }
    }

    /// From a GeoTIFF ModelTransformation 4x4 row-major matrix.
    pub fn from_model_transformation(m: &[f64]) -> Option<Self> {
        if m.len() < 16 {
            return None;
        }
        Some(Self {
            a: m[0],
            b: m[1],
            c: m[3],
            d: m[4],
            e: m[5],
            f: m[7],
        })
    }

    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.c + self.a * col + self.b * row,
            self.f + self.d * col + self.e * row,
        )
    }
}

impl From<GeoReference> for Affine {
    fn from(g: GeoReference) -> Self {
        Affine::north_up(g.origin_x, g.origin_y, g.pixel_x_size, g.pixel_y_size)
    }
}

/// Random-access reader over a georeferenced raster.
///
/// Implementations hide whether the backing storage is organised in
/// strips or tiles: [`SourceReader::read_window`] returns exactly the
/// requested pixels, stitched from as many chunks as needed.
pub trait SourceReader {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Colour model of the source, which drives the tile encoding.
    fn color_space(&self) -> ColorSpace;

    /// EPSG code declared by the source, if any.
    fn epsg(&self) -> Option<i32>;

    fn transform(&self) -> Affine;

    /// Short description of the backing layout for logs and dry runs.
    fn layout(&self) -> String;

    fn read_window(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Canvas>;

    fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        self.transform().pixel_to_map(col, row)
    }
}

/// A source held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    canvas: Canvas,
    georef: GeoReference,
}

impl MemorySource {
    pub fn new(canvas: Canvas, georef: GeoReference) -> Self {
        Self { canvas, georef }
    }
}

impl SourceReader for MemorySource {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn color_space(&self) -> ColorSpace {
        self.canvas.color_space()
    }

    fn epsg(&self) -> Option<i32> {
        self.georef.epsg
    }

    fn transform(&self) -> Affine {
        self.georef.into()
    }

    fn layout(&self) -> String {
        "memory".to_string()
    }

    fn read_window(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Canvas> {
        check_window(self.width(), self.height(), x, y, width, height)?;
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for row in y..y + height {
            out.extend_from_slice(&self.canvas.row(row)[x as usize..(x + width) as usize]);
        }
        Ok(Canvas::from_pixels(width, height, out)?.with_color_space(self.canvas.color_space()))
    }
}

/// Reject windows that are empty or extend past the raster.
pub(crate) fn check_window(
    raster_width: u32,
    raster_height: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height }.into());
    }
    let fits = x.checked_add(width).is_some_and(|r| r <= raster_width)
        && y.checked_add(height).is_some_and(|b| b <= raster_height);
    if !fits {
        return Err(IngestionError::source_read(format!(
            "window {}x{}+{}+{} outside raster {}x{}",
            width, height, x, y, raster_width, raster_height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_north_up() {
        let t = Affine::north_up(100.0, 500.0, 2.0, 0.5);
        assert_eq!(t.pixel_to_map(0.0, 0.0), (100.0, 500.0));
        assert_eq!(t.pixel_to_map(10.0, 4.0), (120.0, 498.0));
    }

    #[test]
    fn test_affine_from_matrix() {
        let m = [
            2.0, 0.0, 0.0, 100.0, //
            0.0, -2.0, 0.0, 500.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = Affine::from_model_transformation(&m).unwrap();
        assert_eq!(t, Affine::north_up(100.0, 500.0, 2.0, 2.0));
        assert!(Affine::from_model_transformation(&m[..12]).is_none());
    }

    #[test]
    fn test_memory_source_window() {
        let pixels: Vec<u32> = (0..16).collect();
        let canvas = Canvas::from_pixels(4, 4, pixels).unwrap();
        let georef = GeoReference::from_center(2.0, 2.0, 4, 4, 1.0, 1.0, Some(3003));
        let mut src = MemorySource::new(canvas, georef);

        let w = src.read_window(1, 2, 2, 2).unwrap();
        assert_eq!(w.pixels(), &[9, 10, 13, 14]);
        assert!(src.read_window(3, 3, 2, 1).is_err());
        assert!(src.read_window(0, 0, 0, 1).is_err());
        assert_eq!(src.pixel_to_map(4.0, 4.0), (4.0, 0.0));
    }
}
