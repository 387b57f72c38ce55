//! Configuration for pyramid synthesis.

use ingestion::config::{DEFAULT_QUALITY, MAX_QUALITY, MAX_TILE_SIZE, MIN_QUALITY, MIN_TILE_SIZE};
use raster_common::{color, ImageFormat, RasterResult};
use renderer::TileEncoding;
use serde::{Deserialize, Serialize};

use crate::matcher::{ExactMatcher, NeighborMatcher, ToleranceMatcher};

/// Default edge of a topmost tile, before the 2:1 thumbnail.
pub const DEFAULT_TOPMOST_TILE_SIZE: u32 = 512;

/// Configuration shared by the adjacency and topmost builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Family of the synthesised tiles; always stored as its RGB variant.
    pub format: ImageFormat,

    /// JPEG quality (10-90).
    pub quality: u8,

    /// Topmost tile edge in pixels (128-8192).
    pub tile_size: u32,

    /// Source pixels of this colour are not painted by the topmost builder.
    pub transparent_color: Option<u32>,

    /// Fill for areas no tile covers.
    pub background_color: u32,

    /// Largest coordinate difference still treated as a shared tile edge.
    /// Zero means exact equality.
    pub neighbor_tolerance: f64,

    /// Report what would be built without writing.
    pub dry_run: bool,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
            tile_size: DEFAULT_TOPMOST_TILE_SIZE,
            transparent_color: None,
            background_color: color::BLACK,
            neighbor_tolerance: 0.0,
            dry_run: false,
        }
    }
}

impl PyramidConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_PYRAMID_FORMAT") {
            if let Ok(format) = val.parse() {
                config.format = format;
            }
        }

        if let Ok(val) = std::env::var("RASTER_PYRAMID_QUALITY") {
            if let Ok(quality) = val.parse() {
                config.quality = quality;
            }
        }

        if let Ok(val) = std::env::var("RASTER_TOPMOST_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("RASTER_NEIGHBOR_TOLERANCE") {
            if let Ok(tolerance) = val.parse() {
                config.neighbor_tolerance = tolerance;
            }
        }

        config.normalized()
    }

    /// Pull quality and tile size into their accepted ranges.
    pub fn normalized(mut self) -> Self {
        self.quality = self.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self.tile_size = self.tile_size.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.format == ImageFormat::Gif {
            return Err("format must be one of jpeg, png, tiff".to_string());
        }

        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }

        if !(self.neighbor_tolerance >= 0.0 && self.neighbor_tolerance.is_finite()) {
            return Err("neighbor_tolerance must be a finite value >= 0".to_string());
        }

        Ok(())
    }

    /// Encoding of every synthesised tile.
    pub fn encoding(&self) -> RasterResult<TileEncoding> {
        TileEncoding::rgb_for(self.format)
    }

    /// Neighbour comparator implied by `neighbor_tolerance`.
    pub fn matcher(&self) -> Box<dyn NeighborMatcher> {
        if self.neighbor_tolerance > 0.0 {
            Box::new(ToleranceMatcher::new(self.neighbor_tolerance))
        } else {
            Box::new(ExactMatcher)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PyramidConfig::default();
        assert_eq!(config.format, ImageFormat::Png);
        assert_eq!(config.quality, 75);
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.background_color, 0x000000);
        assert!(config.validate().is_ok());
        assert_eq!(config.encoding().unwrap(), TileEncoding::PngRgb);
    }

    #[test]
    fn test_normalized_clamps() {
        let config = PyramidConfig {
            quality: 100,
            tile_size: 16,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.quality, 90);
        assert_eq!(config.tile_size, 128);
    }

    #[test]
    fn test_gif_rejected() {
        let config = PyramidConfig {
            format: ImageFormat::Gif,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(config.encoding().is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = PyramidConfig {
            neighbor_tolerance: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_matcher_selection() {
        let exact = PyramidConfig::default().matcher();
        assert!(!exact.same(1.0, 1.0 + 1e-9));

        let loose = PyramidConfig {
            neighbor_tolerance: 1e-6,
            ..Default::default()
        }
        .matcher();
        assert!(loose.same(1.0, 1.0 + 1e-9));
    }
}
