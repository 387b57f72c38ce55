//! Canvas resampling.
//!
//! - [`resize`]: block-average when shrinking by an exact integer factor,
//!   16.16 fixed-point nearest neighbour otherwise.
//! - [`make_thumbnail`]: area-weighted 2:1 reduction used by pyramid
//!   synthesis.

use raster_common::color::{blue, green, red, true_color};

use crate::canvas::Canvas;

/// Resize `src` to `width x height`, keeping its colour-space tag.
pub fn resize(src: &Canvas, width: u32, height: u32) -> Canvas {
    if width == src.width() && height == src.height() {
        return src.clone();
    }
    if width == 0 || height == 0 {
        return Canvas::new(width, height).with_color_space(src.color_space());
    }

    let shrink_exact = src.width() >= width
        && src.height() >= height
        && src.width() % width == 0
        && src.height() % height == 0;
    let out = if shrink_exact {
        shrink_by(src, width, height)
    } else {
        nearest(src, width, height)
    };
    out.with_color_space(src.color_space())
}

/// Average each `(src/dst)` block into one output pixel.
///
/// Callers guarantee the source dimensions are exact multiples.
fn shrink_by(src: &Canvas, width: u32, height: u32) -> Canvas {
    let x_factor = (src.width() / width) as usize;
    let y_factor = (src.height() / height) as usize;
    let count = (x_factor * y_factor) as u32;

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
            for y1 in 0..y_factor {
                let row = src.row((y * y_factor + y1) as u32);
                for &p in &row[x * x_factor..(x + 1) * x_factor] {
                    r += red(p) as u32;
                    g += green(p) as u32;
                    b += blue(p) as u32;
                }
            }
            pixels.push(true_color(
                (r / count) as u8,
                (g / count) as u8,
                (b / count) as u8,
            ));
        }
    }
    Canvas::from_pixels(width, height, pixels).unwrap_or_else(|_| Canvas::new(width, height))
}

/// Pixel replication with 16.16 fixed-point stepping.
fn nearest(src: &Canvas, width: u32, height: u32) -> Canvas {
    let x_delta = ((src.width() as u64) << 16) / width as u64;
    let y_delta = ((src.height() as u64) << 16) / height as u64;

    let columns: Vec<usize> = (0..width as u64)
        .map(|i| (((i * x_delta) >> 16) as usize).min(src.width() as usize - 1))
        .collect();

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for j in 0..height as u64 {
        let sy = (((j * y_delta) >> 16) as u32).min(src.height() - 1);
        let row = src.row(sy);
        pixels.extend(columns.iter().map(|&sx| row[sx]));
    }
    Canvas::from_pixels(width, height, pixels).unwrap_or_else(|_| Canvas::new(width, height))
}

/// Half-size thumbnail; odd dimensions round up.
pub fn make_thumbnail(src: &Canvas) -> Canvas {
    let width = src.width().div_ceil(2).max(1);
    let height = src.height().div_ceil(2).max(1);
    resample_area(src, width, height)
}

/// Area-weighted resampling: every output pixel is the coverage-weighted
/// mean of the source pixels under it.
pub fn resample_area(src: &Canvas, width: u32, height: u32) -> Canvas {
    if src.width() == 0 || src.height() == 0 || width == 0 || height == 0 {
        return Canvas::new(width, height).with_color_space(src.color_space());
    }

    let x_spans = coverage(src.width(), width);
    let y_spans = coverage(src.height(), height);

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y_span in &y_spans {
        for x_span in &x_spans {
            let (mut r, mut g, mut b, mut total) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
            for &(sy, wy) in y_span {
                let row = src.row(sy);
                for &(sx, wx) in x_span {
                    let p = row[sx as usize];
                    let w = wx * wy;
                    r += red(p) as f64 * w;
                    g += green(p) as f64 * w;
                    b += blue(p) as f64 * w;
                    total += w;
                }
            }
            if total > 0.0 {
                r /= total;
                g /= total;
                b /= total;
            }
            pixels.push(true_color(channel(r), channel(g), channel(b)));
        }
    }
    Canvas::from_pixels(width, height, pixels)
        .unwrap_or_else(|_| Canvas::new(width, height))
        .with_color_space(src.color_space())
}

/// For each output index, the source indices it covers and by how much.
fn coverage(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|i| {
            let start = i as f64 * scale;
            let end = ((i + 1) as f64 * scale).min(src_len as f64);
            let mut spans = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    spans.push((s, hi - lo));
                }
                s += 1;
            }
            spans
        })
        .collect()
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
