//! PNG encoding for canvases.
//!
//! Three encodings:
//! - **Grayscale (color type 0)**: one luminance byte per pixel.
//! - **Indexed (color type 3)**: used when the canvas has at most 256
//!   distinct colours; otherwise falls back to RGB.
//! - **RGB (color type 2)**: full colour.

use std::collections::HashMap;
use std::io::Write;

use raster_common::color::{blue, green, red};

use crate::canvas::Canvas;

/// Maximum colors for indexed PNG (PNG8)
pub const MAX_PALETTE_SIZE: usize = 256;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Extract a palette and per-pixel indices, or `None` past 256 colours.
pub fn extract_palette(pixels: &[u32]) -> Option<(Vec<u32>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<u32> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len());

    for &pixel in pixels {
        let index = match color_to_index.get(&pixel) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push(pixel);
                color_to_index.insert(pixel, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Indexed PNG, or RGB when the canvas exceeds 256 colours.
pub fn create_png_palette(canvas: &Canvas) -> Result<Vec<u8>, String> {
    match extract_palette(canvas.pixels()) {
        Some((palette, indices)) => {
            create_png_indexed(canvas.width(), canvas.height(), &palette, &indices)
        }
        None => create_png_rgb(canvas),
    }
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: u32,
    height: u32,
    palette: &[u32],
    indices: &[u8],
) -> Result<Vec<u8>, String> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    // PLTE chunk (palette)
    let mut plte_data = Vec::with_capacity(palette.len() * 3);
    for &c in palette {
        plte_data.extend_from_slice(&[red(c), green(c), blue(c)]);
    }
    write_chunk(&mut png, b"PLTE", &plte_data);

    let idat_data = deflate_scanlines(indices, width as usize, height as usize)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Grayscale PNG (color type 0). Non-grey pixels are reduced to luma.
pub fn create_png_gray(canvas: &Canvas) -> Result<Vec<u8>, String> {
    let samples: Vec<u8> = canvas.pixels().iter().map(|&p| luma(p)).collect();

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(canvas.width(), canvas.height(), 0));

    let idat_data = deflate_scanlines(&samples, canvas.width() as usize, canvas.height() as usize)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// RGB PNG (color type 2).
pub fn create_png_rgb(canvas: &Canvas) -> Result<Vec<u8>, String> {
    let mut samples = Vec::with_capacity(canvas.pixels().len() * 3);
    for &p in canvas.pixels() {
        samples.extend_from_slice(&[red(p), green(p), blue(p)]);
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(canvas.width(), canvas.height(), 2));

    let idat_data = deflate_scanlines(
        &samples,
        canvas.width() as usize * 3,
        canvas.height() as usize,
    )
    .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Color type stored in the IHDR of an encoded PNG.
pub fn png_color_type(data: &[u8]) -> Option<u8> {
    if data.len() < 26 || data[..8] != PNG_SIGNATURE || &data[12..16] != b"IHDR" {
        return None;
    }
    Some(data[25])
}

/// ITU-R 601 luma; exact for grey pixels.
pub fn luma(p: u32) -> u8 {
    let (r, g, b) = (red(p), green(p), blue(p));
    if r == g && g == b {
        return r;
    }
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

fn ihdr(width: u32, height: u32, color_type: u8) -> Vec<u8> {
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&width.to_be_bytes());
    ihdr_data.extend_from_slice(&height.to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color_type);
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    ihdr_data
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let crc_data = [chunk_type.as_slice(), data].concat();
    let crc = crc32_checksum(&crc_data);
    png.extend_from_slice(&crc.to_be_bytes());
}

/// Deflate raw scanlines of `row_bytes` each for the IDAT chunk.
fn deflate_scanlines(
    data: &[u8],
    row_bytes: usize,
    height: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    // Add filter byte (0 = no filter) to each scanline
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&uncompressed)?;
    let compressed = encoder.finish()?;

    Ok(compressed)
}

/// Simple CRC32 checksum (PNG-style)
fn crc32_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
