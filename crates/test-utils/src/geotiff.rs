//! Synthetic GeoTIFF sources.

use std::path::Path;

use raster_common::{BoundingBox, RasterResult};
use renderer::{Canvas, GeoReference, GeoTiffWriter, SampleLayout};

use crate::generators::coordinate_pattern;

/// Builder for a north-up GeoTIFF with known pixels and georeferencing.
///
/// ```ignore
/// let src = SyntheticGeoTiff::new(1000, 600).origin(500_000.0, 4_600_000.0).pixel_size(0.5);
/// src.write(dir.path().join("ortho.tif"))?;
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticGeoTiff {
    pub width: u32,
    pub height: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub epsg: Option<i32>,
    pub layout: SampleLayout,
    pub rows_per_strip: Option<u32>,
    pixels: Vec<u32>,
}

impl SyntheticGeoTiff {
    /// RGB coordinate pattern anchored at `(0, height)` with unit pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            origin_x: 0.0,
            origin_y: height as f64,
            pixel_x_size: 1.0,
            pixel_y_size: 1.0,
            epsg: Some(32632),
            layout: SampleLayout::Rgb8,
            rows_per_strip: None,
            pixels: coordinate_pattern(width, height),
        }
    }

    /// Upper-left corner in map units.
    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin_x = x;
        self.origin_y = y;
        self
    }

    pub fn pixel_size(mut self, size: f64) -> Self {
        self.pixel_x_size = size;
        self.pixel_y_size = size;
        self
    }

    pub fn epsg(mut self, epsg: Option<i32>) -> Self {
        self.epsg = epsg;
        self
    }

    /// Write single-channel samples (luma of the pixels).
    pub fn gray(mut self) -> Self {
        self.layout = SampleLayout::Gray8;
        self
    }

    /// Split the image into strips of `rows` rows.
    pub fn rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    /// Replace the pixel content; `pixels` must hold `width * height` values.
    pub fn pixels(mut self, pixels: Vec<u32>) -> Self {
        assert_eq!(pixels.len(), self.width as usize * self.height as usize);
        self.pixels = pixels;
        self
    }

    pub fn canvas(&self) -> Canvas {
        Canvas::from_pixels(self.width, self.height, self.pixels.clone())
            .expect("pixel buffer matches dimensions")
    }

    pub fn georeference(&self) -> GeoReference {
        GeoReference {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            pixel_x_size: self.pixel_x_size,
            pixel_y_size: self.pixel_y_size,
            epsg: self.epsg,
        }
    }

    /// Map extent covered by the whole image.
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin_x,
            self.origin_y - self.height as f64 * self.pixel_y_size,
            self.origin_x + self.width as f64 * self.pixel_x_size,
            self.origin_y,
        )
    }

    pub fn write(&self, path: impl AsRef<Path>) -> RasterResult<()> {
        let canvas = self.canvas();
        let mut writer = GeoTiffWriter::new(&canvas, self.georeference()).layout(self.layout);
        if let Some(rows) = self.rows_per_strip {
            writer = writer.rows_per_strip(rows);
        }
        writer.write(path)
    }
}
