//! Spatial tile store for raster pyramids.
//!
//! Provides:
//! - SQLite schema per table prefix (rasters, metadata, R*Tree index)
//! - The two tile query shapes (spatial index and predicate scan)
//! - The `raster_pyramids` level catalogue
//! - Transactional bulk writes

pub mod schema;
pub mod store;
pub mod wkb;

pub use schema::{TableNames, PYRAMIDS_TABLE, RESOLUTION_INDEX};
pub use store::{NewTile, RasterStore, StoredTile, TileWriter};
