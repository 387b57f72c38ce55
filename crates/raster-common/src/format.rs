//! Output format identifiers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// Compressed image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tif",
        }
    }

    /// Sniff the container from leading magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xff, 0xd8]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10]) {
            Some(ImageFormat::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Some(ImageFormat::Tiff)
        } else {
            None
        }
    }
}

impl FromStr for ImageFormat {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "gif" => Ok(ImageFormat::Gif),
            "tiff" | "tif" => Ok(ImageFormat::Tiff),
            other => Err(RasterError::UnknownFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncompressed interleaved pixel array layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawFormat {
    Rgb,
    Rgba,
    Argb,
    Bgr,
    Bgra,
}

impl RawFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            RawFormat::Rgb | RawFormat::Bgr => 3,
            RawFormat::Rgba | RawFormat::Argb | RawFormat::Bgra => 4,
        }
    }
}

impl FromStr for RawFormat {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rgb" => Ok(RawFormat::Rgb),
            "rgba" => Ok(RawFormat::Rgba),
            "argb" => Ok(RawFormat::Argb),
            "bgr" => Ok(RawFormat::Bgr),
            "bgra" => Ok(RawFormat::Bgra),
            other => Err(RasterError::UnknownFormat(other.to_string())),
        }
    }
}
