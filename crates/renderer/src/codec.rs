//! Tile and output codecs.
//!
//! Decoding goes through the `image` crate for every format; encoding uses
//! the crate encoders for JPEG and GIF, the `tiff` encoder for TIFF, and the
//! in-house writer in [`crate::png`] for PNG.

use std::collections::HashSet;
use std::io::Cursor;

use image::{ColorType, DynamicImage};
use raster_common::color::{blue, green, red, BLACK, WHITE};
use raster_common::{ColorSpace, ImageFormat, RasterError, RasterResult};
use tiff::encoder::{colortype, compression::Lzw, TiffEncoder};

use crate::canvas::Canvas;
use crate::png;

/// Concrete tile/output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEncoding {
    /// Bilevel TIFF written as LZW 8-bit grey holding only 0 and 255;
    /// the encoder has no CCITT G4 support.
    TiffBilevel,
    /// Palette TIFF written as LZW RGB without a ColorMap; the palette tag
    /// is recovered on decode.
    TiffPaletteRgb,
    TiffGray,
    TiffRgb,
    PngPalette,
    PngGray,
    PngRgb,
    GifPalette,
    JpegGray,
    JpegRgb,
}

impl TileEncoding {
    pub fn format(&self) -> ImageFormat {
        match self {
            TileEncoding::TiffBilevel
            | TileEncoding::TiffPaletteRgb
            | TileEncoding::TiffGray
            | TileEncoding::TiffRgb => ImageFormat::Tiff,
            TileEncoding::PngPalette | TileEncoding::PngGray | TileEncoding::PngRgb => {
                ImageFormat::Png
            }
            TileEncoding::GifPalette => ImageFormat::Gif,
            TileEncoding::JpegGray | TileEncoding::JpegRgb => ImageFormat::Jpeg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TileEncoding::TiffBilevel => "tiff-bilevel",
            TileEncoding::TiffPaletteRgb => "tiff-palette-rgb",
            TileEncoding::TiffGray => "tiff-gray",
            TileEncoding::TiffRgb => "tiff-rgb",
            TileEncoding::PngPalette => "png-palette",
            TileEncoding::PngGray => "png-gray",
            TileEncoding::PngRgb => "png-rgb",
            TileEncoding::GifPalette => "gif-palette",
            TileEncoding::JpegGray => "jpeg-gray",
            TileEncoding::JpegRgb => "jpeg-rgb",
        }
    }

    /// Encoding for a rendered canvas of colour space `cs` in `format`.
    ///
    /// GIF only carries Monochrome, Grayscale and Palette canvases.
    pub fn for_output(format: ImageFormat, cs: ColorSpace) -> RasterResult<Self> {
        let encoding = match (format, cs) {
            (ImageFormat::Tiff, ColorSpace::Monochrome) => TileEncoding::TiffBilevel,
            (ImageFormat::Tiff, ColorSpace::Grayscale) => TileEncoding::TiffGray,
            (ImageFormat::Tiff, ColorSpace::Palette) => TileEncoding::TiffPaletteRgb,
            (ImageFormat::Tiff, ColorSpace::Rgb) => TileEncoding::TiffRgb,
            (ImageFormat::Png, ColorSpace::Monochrome | ColorSpace::Grayscale) => {
                TileEncoding::PngGray
            }
            (ImageFormat::Png, ColorSpace::Palette) => TileEncoding::PngPalette,
            (ImageFormat::Png, ColorSpace::Rgb) => TileEncoding::PngRgb,
            (ImageFormat::Gif, ColorSpace::Rgb) => {
                return Err(RasterError::Configuration(
                    "GIF output requires a monochrome, grayscale or palette image".to_string(),
                ))
            }
            (ImageFormat::Gif, _) => TileEncoding::GifPalette,
            (ImageFormat::Jpeg, ColorSpace::Monochrome | ColorSpace::Grayscale) => {
                TileEncoding::JpegGray
            }
            (ImageFormat::Jpeg, _) => TileEncoding::JpegRgb,
        };
        Ok(encoding)
    }

    /// RGB variant of `format`, used for synthesised pyramid tiles.
    pub fn rgb_for(format: ImageFormat) -> RasterResult<Self> {
        match format {
            ImageFormat::Tiff => Ok(TileEncoding::TiffRgb),
            ImageFormat::Png => Ok(TileEncoding::PngRgb),
            ImageFormat::Jpeg => Ok(TileEncoding::JpegRgb),
            ImageFormat::Gif => Err(RasterError::Configuration(
                "GIF cannot store RGB pyramid tiles".to_string(),
            )),
        }
    }

    /// Encoding for ingested tiles given the source colour model.
    ///
    /// `format` overrides the family; each colour model has its own default
    /// (palette: GIF, bilevel: TIFF, otherwise JPEG).
    pub fn for_source(cs: ColorSpace, format: Option<ImageFormat>) -> Self {
        match cs {
            ColorSpace::Monochrome => TileEncoding::TiffBilevel,
            ColorSpace::Palette => match format {
                Some(ImageFormat::Png) => TileEncoding::PngPalette,
                Some(ImageFormat::Tiff) => TileEncoding::TiffPaletteRgb,
                _ => TileEncoding::GifPalette,
            },
            ColorSpace::Grayscale => match format {
                Some(ImageFormat::Png) => TileEncoding::PngGray,
                Some(ImageFormat::Tiff) => TileEncoding::TiffGray,
                _ => TileEncoding::JpegGray,
            },
            ColorSpace::Rgb => match format {
                Some(ImageFormat::Png) => TileEncoding::PngRgb,
                Some(ImageFormat::Tiff) => TileEncoding::TiffRgb,
                _ => TileEncoding::JpegRgb,
            },
        }
    }
}

impl std::fmt::Display for TileEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify pixel content into the narrowest colour space that holds it.
pub fn classify(canvas: &Canvas) -> ColorSpace {
    let pixels = canvas.pixels();
    if pixels.iter().all(|&p| p == BLACK || p == WHITE) {
        return ColorSpace::Monochrome;
    }
    if pixels
        .iter()
        .all(|&p| red(p) == green(p) && green(p) == blue(p))
    {
        return ColorSpace::Grayscale;
    }

    let mut seen = HashSet::with_capacity(png::MAX_PALETTE_SIZE + 1);
    for &p in pixels {
        seen.insert(p);
        if seen.len() > png::MAX_PALETTE_SIZE {
            return ColorSpace::Rgb;
        }
    }
    ColorSpace::Palette
}

/// Decode a stored tile or image into a tagged canvas.
pub fn decode(data: &[u8]) -> RasterResult<Canvas> {
    let format = ImageFormat::detect(data)
        .ok_or_else(|| RasterError::codec("unrecognised image signature"))?;
    let image = image::load_from_memory(data)
        .map_err(|e| RasterError::codec(format!("{} decode failed: {}", format, e)))?;

    let width = image.width();
    let height = image.height();
    let is_luma = matches!(image, DynamicImage::ImageLuma8(_));
    let canvas = if is_luma {
        Canvas::from_gray8(width, height, image.to_luma8().as_raw())?
    } else {
        Canvas::from_rgb8(width, height, image.to_rgb8().as_raw())?
    };

    let tag = match format {
        ImageFormat::Jpeg if is_luma => ColorSpace::Grayscale,
        ImageFormat::Jpeg => ColorSpace::Rgb,
        ImageFormat::Png => match png::png_color_type(data) {
            Some(0) => ColorSpace::Grayscale,
            Some(3) => ColorSpace::Palette,
            _ => ColorSpace::Rgb,
        },
        ImageFormat::Gif => ColorSpace::Palette,
        ImageFormat::Tiff => classify(&canvas),
    };
    Ok(canvas.with_color_space(tag))
}

/// Encode `canvas` with `encoding`. `quality` only affects JPEG.
pub fn encode(canvas: &Canvas, encoding: TileEncoding, quality: u8) -> RasterResult<Vec<u8>> {
    match encoding {
        TileEncoding::JpegRgb => encode_jpeg(&rgb_samples(canvas), canvas, ColorType::Rgb8, quality),
        TileEncoding::JpegGray => {
            encode_jpeg(&gray_samples(canvas), canvas, ColorType::L8, quality)
        }
        TileEncoding::PngRgb => png::create_png_rgb(canvas).map_err(RasterError::Codec),
        TileEncoding::PngGray => png::create_png_gray(canvas).map_err(RasterError::Codec),
        TileEncoding::PngPalette => png::create_png_palette(canvas).map_err(RasterError::Codec),
        TileEncoding::GifPalette => encode_gif(canvas),
        TileEncoding::TiffRgb | TileEncoding::TiffPaletteRgb => encode_tiff_rgb(canvas),
        TileEncoding::TiffGray => encode_tiff_gray(canvas, gray_samples(canvas)),
        TileEncoding::TiffBilevel => {
            let bilevel = gray_samples(canvas)
                .into_iter()
                .map(|v| if v >= 128 { 255 } else { 0 })
                .collect();
            encode_tiff_gray(canvas, bilevel)
        }
    }
}

/// Encode a rendered canvas in `format`, picking the variant from its tag.
pub fn encode_output(canvas: &Canvas, format: ImageFormat, quality: u8) -> RasterResult<Vec<u8>> {
    let encoding = TileEncoding::for_output(format, canvas.color_space())?;
    encode(canvas, encoding, quality)
}

fn rgb_samples(canvas: &Canvas) -> Vec<u8> {
    let mut out = Vec::with_capacity(canvas.pixels().len() * 3);
    for &p in canvas.pixels() {
        out.extend_from_slice(&[red(p), green(p), blue(p)]);
    }
    out
}

fn gray_samples(canvas: &Canvas) -> Vec<u8> {
    canvas.pixels().iter().map(|&p| png::luma(p)).collect()
}

fn encode_jpeg(samples: &[u8], canvas: &Canvas, color: ColorType, quality: u8) -> RasterResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode(samples, canvas.width(), canvas.height(), color)
        .map_err(|e| RasterError::codec(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

fn encode_gif(canvas: &Canvas) -> RasterResult<Vec<u8>> {
    let mut rgba = Vec::with_capacity(canvas.pixels().len() * 4);
    for &p in canvas.pixels() {
        rgba.extend_from_slice(&[red(p), green(p), blue(p), 255]);
    }

    let mut buf = Vec::new();
    {
        // The trailer is written when the encoder drops.
        let mut encoder = image::codecs::gif::GifEncoder::new(&mut buf);
        encoder
            .encode(&rgba, canvas.width(), canvas.height(), ColorType::Rgba8)
            .map_err(|e| RasterError::codec(format!("GIF encode failed: {}", e)))?;
    }
    Ok(buf)
}

fn encode_tiff_rgb(canvas: &Canvas) -> RasterResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_error)?;
    encoder
        .write_image_with_compression::<colortype::RGB8, _>(
            canvas.width(),
            canvas.height(),
            Lzw,
            &rgb_samples(canvas),
        )
        .map_err(tiff_error)?;
    Ok(cursor.into_inner())
}

fn encode_tiff_gray(canvas: &Canvas, samples: Vec<u8>) -> RasterResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_error)?;
    encoder
        .write_image_with_compression::<colortype::Gray8, _>(
            canvas.width(),
            canvas.height(),
            Lzw,
            &samples,
        )
        .map_err(tiff_error)?;
    Ok(cursor.into_inner())
}

fn tiff_error(e: tiff::TiffError) -> RasterError {
    RasterError::codec(format!("TIFF encode failed: {}", e))
}
