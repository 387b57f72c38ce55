//! Resolution levels and tile access strategies.

use serde::{Deserialize, Serialize};

/// Tile counts above this switch lookups to the spatial index.
pub const SPATIAL_INDEX_THRESHOLD: i64 = 500;

/// One distinct resolution present in a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLevel {
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub tile_count: i64,
}

impl ResolutionLevel {
    pub fn new(pixel_x_size: f64, pixel_y_size: f64, tile_count: i64) -> Self {
        Self {
            pixel_x_size,
            pixel_y_size,
            tile_count,
        }
    }

    /// Query strategy suited to this level's tile population.
    pub fn strategy(&self) -> AccessStrategy {
        if self.tile_count > SPATIAL_INDEX_THRESHOLD {
            AccessStrategy::SpatialIndex
        } else {
            AccessStrategy::Scan
        }
    }
}

/// How tiles intersecting a window are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStrategy {
    /// Range query against the R*Tree over tile footprints.
    SpatialIndex,
    /// Predicate scan over the footprint columns.
    Scan,
}
