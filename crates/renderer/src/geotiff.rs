//! GeoTIFF writer for rendered canvases.
//!
//! Writes an LZW-compressed strip TIFF carrying ModelPixelScale,
//! ModelTiepoint and a GeoKeyDirectory with the EPSG code.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use raster_common::color::{blue, green, red};
use raster_common::{ColorSpace, RasterError, RasterResult};
use tiff::encoder::{colortype, compression::Lzw, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

use crate::canvas::Canvas;
use crate::png::luma;

// GeoTIFF tag IDs
pub const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
pub const GEOTIFF_MODELTIEPOINT: u16 = 33922;
pub const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;

// GeoKey IDs
pub const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
pub const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Affine georeferencing of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    /// Map X of the upper-left corner.
    pub origin_x: f64,
    /// Map Y of the upper-left corner.
    pub origin_y: f64,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub epsg: Option<i32>,
}

impl GeoReference {
    /// Georeference of a `width x height` raster centred on `(cx, cy)`.
    pub fn from_center(
        cx: f64,
        cy: f64,
        width: u32,
        height: u32,
        pixel_x_size: f64,
        pixel_y_size: f64,
        epsg: Option<i32>,
    ) -> Self {
        Self {
            origin_x: cx - (width as f64 * pixel_x_size) / 2.0,
            origin_y: cy + (height as f64 * pixel_y_size) / 2.0,
            pixel_x_size,
            pixel_y_size,
            epsg,
        }
    }

    /// Map coordinates of pixel corner `(x, y)`.
    pub fn pixel_to_map(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.origin_x + x * self.pixel_x_size,
            self.origin_y - y * self.pixel_y_size,
        )
    }
}

/// EPSG codes in 4000..5000 are geographic CRS.
pub fn is_geographic_epsg(epsg: i32) -> bool {
    (4000..5000).contains(&epsg)
}

/// Sample layout written to the TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    Gray8,
    Rgb8,
}

impl SampleLayout {
    pub fn for_color_space(cs: ColorSpace) -> Self {
        match cs {
            ColorSpace::Monochrome | ColorSpace::Grayscale => SampleLayout::Gray8,
            ColorSpace::Palette | ColorSpace::Rgb => SampleLayout::Rgb8,
        }
    }
}

/// Builder for GeoTIFF output.
pub struct GeoTiffWriter<'a> {
    canvas: &'a Canvas,
    georef: GeoReference,
    layout: SampleLayout,
    rows_per_strip: Option<u32>,
}

impl<'a> GeoTiffWriter<'a> {
    pub fn new(canvas: &'a Canvas, georef: GeoReference) -> Self {
        Self {
            canvas,
            georef,
            layout: SampleLayout::for_color_space(canvas.color_space()),
            rows_per_strip: None,
        }
    }

    pub fn layout(mut self, layout: SampleLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Split the image into strips of `rows` rows.
    pub fn rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows.max(1));
        self
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> RasterResult<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!(
            path = %path.as_ref().display(),
            width = self.canvas.width(),
            height = self.canvas.height(),
            "Wrote GeoTIFF"
        );
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> RasterResult<()> {
        let mut encoder = TiffEncoder::new(writer).map_err(tiff_error)?;
        let (width, height) = (self.canvas.width(), self.canvas.height());

        match self.layout {
            SampleLayout::Gray8 => {
                let samples: Vec<u8> = self.canvas.pixels().iter().map(|&p| luma(p)).collect();
                let mut image = encoder
                    .new_image_with_compression::<colortype::Gray8, _>(width, height, Lzw)
                    .map_err(tiff_error)?;
                if let Some(rows) = self.rows_per_strip {
                    image.rows_per_strip(rows).map_err(tiff_error)?;
                }
                write_geotiff_tags(image.encoder(), &self.georef)?;
                image.write_data(&samples).map_err(tiff_error)?;
            }
            SampleLayout::Rgb8 => {
                let mut samples = Vec::with_capacity(self.canvas.pixels().len() * 3);
                for &p in self.canvas.pixels() {
                    samples.extend_from_slice(&[red(p), green(p), blue(p)]);
                }
                let mut image = encoder
                    .new_image_with_compression::<colortype::RGB8, _>(width, height, Lzw)
                    .map_err(tiff_error)?;
                if let Some(rows) = self.rows_per_strip {
                    image.rows_per_strip(rows).map_err(tiff_error)?;
                }
                write_geotiff_tags(image.encoder(), &self.georef)?;
                image.write_data(&samples).map_err(tiff_error)?;
            }
        }
        Ok(())
    }
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    georef: &GeoReference,
) -> RasterResult<()> {
    let pixel_scale = [georef.pixel_x_size, georef.pixel_y_size, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), &pixel_scale[..])
        .map_err(tiff_error)?;

    // Ties pixel (0, 0) to the upper-left corner.
    let tiepoint = [0.0, 0.0, 0.0, georef.origin_x, georef.origin_y, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), &tiepoint[..])
        .map_err(tiff_error)?;

    let geokeys = build_geokey_directory(georef.epsg);
    dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())
        .map_err(tiff_error)?;
    Ok(())
}

/// GeoKeyDirectory: header `[version, revision, minor, count]` followed by
/// `[key, location, count, value]` entries.
pub fn build_geokey_directory(epsg: Option<i32>) -> Vec<u16> {
    let geographic = epsg.map(is_geographic_epsg).unwrap_or(false);
    let crs_key = epsg.and_then(|code| u16::try_from(code).ok()).map(|code| {
        if geographic {
            [GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]
        } else {
            [PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]
        }
    });

    let count = if crs_key.is_some() { 3 } else { 2 };
    let mut keys = vec![1, 1, 0, count];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if let Some(entry) = crs_key {
        keys.extend_from_slice(&entry);
    }
    keys
}

fn tiff_error(e: tiff::TiffError) -> RasterError {
    RasterError::codec(format!("GeoTIFF write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_center_origin() {
        let g = GeoReference::from_center(100.0, 50.0, 10, 4, 2.0, 0.5, Some(32632));
        assert_eq!(g.origin_x, 90.0);
        assert_eq!(g.origin_y, 51.0);
        assert_eq!(g.pixel_to_map(10.0, 4.0), (110.0, 49.0));
    }

    #[test]
    fn test_geokeys_geographic() {
        let keys = build_geokey_directory(Some(4326));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[4..8], &[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
        assert_eq!(&keys[12..16], &[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, 4326]);
    }

    #[test]
    fn test_geokeys_projected() {
        let keys = build_geokey_directory(Some(32632));
        assert_eq!(&keys[12..16], &[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, 32632]);
    }

    #[test]
    fn test_geokeys_oversized_epsg_skipped() {
        let keys = build_geokey_directory(Some(900913));
        assert_eq!(keys[3], 2);
        assert_eq!(keys.len(), 12);
    }
}
