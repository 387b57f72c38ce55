//! Ingestion options.

use raster_common::ImageFormat;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TILE_SIZE: u32 = 512;
pub const MIN_TILE_SIZE: u32 = 128;
pub const MAX_TILE_SIZE: u32 = 8192;

pub const DEFAULT_QUALITY: u8 = 75;
pub const MIN_QUALITY: u8 = 10;
pub const MAX_QUALITY: u8 = 90;

/// Options for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Largest tile edge in pixels.
    pub tile_size: u32,

    /// Tile encoding family; `None` picks one from the source colour model.
    pub format: Option<ImageFormat>,

    /// JPEG quality for stored tiles.
    pub quality: u8,

    /// SRID written instead of the one found in the source.
    pub epsg_override: Option<i32>,

    /// Plan the tile grid without writing anything.
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            format: None,
            quality: DEFAULT_QUALITY,
            epsg_override: None,
            dry_run: false,
        }
    }
}

impl IngestOptions {
    /// Pull the tile size and quality into their accepted ranges.
    pub fn normalized(mut self) -> Self {
        self.tile_size = self.tile_size.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE);
        self.quality = self.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self
    }

    /// Reject options that cannot be honoured.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }
        if let Some(epsg) = self.epsg_override {
            if epsg <= 0 {
                return Err(format!("invalid EPSG code {}", epsg));
            }
        }
        Ok(())
    }
}
