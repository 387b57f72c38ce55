//! GeoTIFF source reader.
//!
//! Strip- and tile-organised files are both read through the decoder's
//! chunk interface; a window is stitched from every chunk it overlaps.
//! Decoded chunks of the current chunk row stay cached, so a row-major
//! tile walk decodes each chunk once.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use raster_common::color::{true_color, BLACK, WHITE};
use raster_common::ColorSpace;
use renderer::Canvas;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::source::{check_window, Affine, SourceReader};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

const PHOTOMETRIC_WHITE_IS_ZERO: u32 = 0;
const PLANAR_SEPARATE: u32 = 2;

/// Pixel layouts the reader understands.
#[derive(Debug, Clone, PartialEq)]
enum SampleKind {
    Bilevel { white_is_zero: bool },
    Gray8 { white_is_zero: bool },
    Palette8 { colors: Vec<u32> },
    Rgb8,
    Rgba8,
}

impl SampleKind {
    fn color_space(&self) -> ColorSpace {
        match self {
            SampleKind::Bilevel { .. } => ColorSpace::Monochrome,
            SampleKind::Gray8 { .. } => ColorSpace::Grayscale,
            SampleKind::Palette8 { .. } => ColorSpace::Palette,
            SampleKind::Rgb8 | SampleKind::Rgba8 => ColorSpace::Rgb,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SampleKind::Bilevel { .. } => "1-bit",
            SampleKind::Gray8 { .. } => "8-bit grayscale",
            SampleKind::Palette8 { .. } => "8-bit palette",
            SampleKind::Rgb8 => "RGB",
            SampleKind::Rgba8 => "RGBA",
        }
    }
}

/// A GeoTIFF opened for windowed reads.
pub struct GeoTiffSource {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    kind: SampleKind,
    transform: Affine,
    epsg: Option<i32>,
    cache: HashMap<u32, Vec<u32>>,
    cached_row: Option<u32>,
}

impl GeoTiffSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let kind = sample_kind(&mut decoder)?;
        if decoder.get_tag_u32(Tag::PlanarConfiguration).ok() == Some(PLANAR_SEPARATE) {
            return Err(IngestionError::unsupported("planar (band-separate) samples"));
        }

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let chunk_width = chunk_width.max(1);
        let chunk_height = chunk_height.max(1);

        let transform = read_transform(&mut decoder).ok_or_else(|| {
            IngestionError::MissingGeoreference(format!(
                "{} has neither ModelPixelScale/ModelTiepoint nor ModelTransformation",
                path.display()
            ))
        })?;
        let epsg = decoder
            .get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))
            .ok()
            .and_then(|keys| epsg_from_geokeys(&keys));

        debug!(
            path = %path.display(),
            width,
            height,
            chunk_width,
            chunk_height,
            layout = kind.name(),
            epsg = ?epsg,
            "Opened GeoTIFF source"
        );

        Ok(Self {
            path,
            decoder,
            width,
            height,
            chunk_width,
            chunk_height,
            chunks_across: width.div_ceil(chunk_width),
            kind,
            transform,
            epsg,
            cache: HashMap::new(),
            cached_row: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file stores tiles rather than full-width strips.
    pub fn is_tiled(&self) -> bool {
        self.chunk_width < self.width
    }

    /// Decoded pixels of one chunk, padded to the nominal chunk size.
    fn chunk(&mut self, index: u32) -> Result<&Vec<u32>> {
        if !self.cache.contains_key(&index) {
            let (data_w, data_h) = self.decoder.chunk_data_dimensions(index);
            let samples = match self.decoder.read_chunk(index)? {
                DecodingResult::U8(data) => data,
                _ => {
                    return Err(IngestionError::unsupported(
                        "only 8-bit and 1-bit samples are supported",
                    ))
                }
            };
            let pixels = self.convert(&samples, data_w, data_h)?;

            let mut padded = vec![BLACK; (self.chunk_width * self.chunk_height) as usize];
            for row in 0..data_h as usize {
                let src = &pixels[row * data_w as usize..(row + 1) * data_w as usize];
                let start = row * self.chunk_width as usize;
                padded[start..start + data_w as usize].copy_from_slice(src);
            }
            self.cache.insert(index, padded);
        }
        self.cache
            .get(&index)
            .ok_or_else(|| IngestionError::source_read(format!("chunk {} not cached", index)))
    }

    fn convert(&self, samples: &[u8], width: u32, height: u32) -> Result<Vec<u32>> {
        let count = width as usize * height as usize;
        let short = |needed: usize| {
            IngestionError::source_read(format!(
                "{}: chunk holds {} bytes, expected {}",
                self.path.display(),
                samples.len(),
                needed
            ))
        };

        let pixels = match &self.kind {
            SampleKind::Bilevel { white_is_zero } => {
                let stride = (width as usize).div_ceil(8);
                if samples.len() < stride * height as usize {
                    return Err(short(stride * height as usize));
                }
                let mut out = Vec::with_capacity(count);
                for row in samples.chunks(stride).take(height as usize) {
                    for x in 0..width as usize {
                        let bit = (row[x / 8] >> (7 - (x % 8))) & 1 == 1;
                        out.push(if bit != *white_is_zero { WHITE } else { BLACK });
                    }
                }
                out
            }
            SampleKind::Gray8 { white_is_zero } => {
                if samples.len() < count {
                    return Err(short(count));
                }
                samples[..count]
                    .iter()
                    .map(|&v| {
                        let v = if *white_is_zero { 255 - v } else { v };
                        true_color(v, v, v)
                    })
                    .collect()
            }
            SampleKind::Palette8 { colors } => {
                if samples.len() < count {
                    return Err(short(count));
                }
                samples[..count]
                    .iter()
                    .map(|&i| colors.get(i as usize).copied().unwrap_or(BLACK))
                    .collect()
            }
            SampleKind::Rgb8 => {
                if samples.len() < count * 3 {
                    return Err(short(count * 3));
                }
                samples
                    .chunks_exact(3)
                    .take(count)
                    .map(|p| true_color(p[0], p[1], p[2]))
                    .collect()
            }
            SampleKind::Rgba8 => {
                if samples.len() < count * 4 {
                    return Err(short(count * 4));
                }
                samples
                    .chunks_exact(4)
                    .take(count)
                    .map(|p| true_color(p[0], p[1], p[2]))
                    .collect()
            }
        };
        Ok(pixels)
    }

    /// Drop cached chunks above chunk row `first_row`.
    fn evict_above(&mut self, first_row: u32) {
        if self.cached_row.is_some_and(|row| row < first_row) {
            let across = self.chunks_across;
            self.cache.retain(|&index, _| index / across >= first_row);
        }
        self.cached_row = Some(first_row);
    }
}

impl SourceReader for GeoTiffSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color_space(&self) -> ColorSpace {
        self.kind.color_space()
    }

    fn epsg(&self) -> Option<i32> {
        self.epsg
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn layout(&self) -> String {
        let organisation = if self.is_tiled() { "tiles" } else { "strips" };
        format!(
            "{} {} of {}x{}",
            self.kind.name(),
            organisation,
            self.chunk_width,
            self.chunk_height
        )
    }

    fn read_window(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Canvas> {
        check_window(self.width, self.height, x, y, width, height)?;

        let first_col = x / self.chunk_width;
        let last_col = (x + width - 1) / self.chunk_width;
        let first_row = y / self.chunk_height;
        let last_row = (y + height - 1) / self.chunk_height;
        self.evict_above(first_row);

        let (cw, ch) = (self.chunk_width, self.chunk_height);
        let mut out = vec![BLACK; width as usize * height as usize];
        for chunk_row in first_row..=last_row {
            for chunk_col in first_col..=last_col {
                let index = chunk_row * self.chunks_across + chunk_col;
                let chunk = self.chunk(index)?;

                // Overlap of the window and this chunk, in raster pixels.
                let x0 = x.max(chunk_col * cw);
                let x1 = (x + width).min((chunk_col + 1) * cw);
                let y0 = y.max(chunk_row * ch);
                let y1 = (y + height).min((chunk_row + 1) * ch);
                for py in y0..y1 {
                    let src_start = ((py - chunk_row * ch) * cw + (x0 - chunk_col * cw)) as usize;
                    let dst_start = ((py - y) * width + (x0 - x)) as usize;
                    let len = (x1 - x0) as usize;
                    out[dst_start..dst_start + len].copy_from_slice(&chunk[src_start..src_start + len]);
                }
            }
        }

        Ok(Canvas::from_pixels(width, height, out)?.with_color_space(self.kind.color_space()))
    }
}

fn sample_kind(decoder: &mut Decoder<BufReader<File>>) -> Result<SampleKind> {
    let white_is_zero =
        decoder.get_tag_u32(Tag::PhotometricInterpretation).ok() == Some(PHOTOMETRIC_WHITE_IS_ZERO);
    match decoder.colortype()? {
        ColorType::Gray(1) => Ok(SampleKind::Bilevel { white_is_zero }),
        ColorType::Gray(8) => Ok(SampleKind::Gray8 { white_is_zero }),
        ColorType::Palette(8) => {
            let map = decoder.get_tag_u16_vec(Tag::ColorMap)?;
            Ok(SampleKind::Palette8 {
                colors: palette_from_colormap(&map)?,
            })
        }
        ColorType::RGB(8) => Ok(SampleKind::Rgb8),
        ColorType::RGBA(8) => Ok(SampleKind::Rgba8),
        other => Err(IngestionError::unsupported(format!(
            "colour type {:?}",
            other
        ))),
    }
}

/// TIFF ColorMap: all reds, then all greens, then all blues, 16 bits each.
fn palette_from_colormap(map: &[u16]) -> Result<Vec<u32>> {
    if map.is_empty() || map.len() % 3 != 0 {
        return Err(IngestionError::source_read(format!(
            "malformed ColorMap of {} entries",
            map.len()
        )));
    }
    let n = map.len() / 3;
    Ok((0..n)
        .map(|i| {
            true_color(
                (map[i] >> 8) as u8,
                (map[n + i] >> 8) as u8,
                (map[2 * n + i] >> 8) as u8,
            )
        })
        .collect())
}

fn read_transform(decoder: &mut Decoder<BufReader<File>>) -> Option<Affine> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))
        .ok();
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))
        .ok();

    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            // Tiepoint raster (i, j) maps to model (x, y).
            let origin_x = t[3] - t[0] * s[0];
            let origin_y = t[4] + t[1] * s[1];
            Some(Affine::north_up(origin_x, origin_y, s[0], s[1]))
        }
        _ => decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION))
            .ok()
            .and_then(|m| Affine::from_model_transformation(&m)),
    }
}

/// Projected CRS first, then geographic; user-defined codes do not count.
pub(crate) fn epsg_from_geokeys(keys: &[u16]) -> Option<i32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();
    let inline_value = |wanted: u16| {
        entries
            .iter()
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
            .filter(|&v| v != USER_DEFINED && v != 0)
    };
    inline_value(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| inline_value(GEOGRAPHIC_TYPE_GEO_KEY))
        .map(i32::from)
}
