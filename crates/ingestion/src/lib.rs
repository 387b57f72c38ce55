//! Raster ingestion.
//!
//! Splits georeferenced source rasters into a grid of tiles and writes
//! them, with their map footprints, into a raster store.
//!
//! - [`SourceReader`]: windowed reads over strip- or tile-organised data
//! - [`GeoTiffSource`]: GeoTIFF implementation with EPSG detection
//! - [`TileGrid`]: tile sizing and enumeration
//! - [`Ingester`]: transactional per-file ingestion and directory scans

pub mod config;
pub mod error;
pub mod geotiff;
pub mod grid;
mod ingester;
pub mod source;

pub use config::IngestOptions;
pub use error::{IngestionError, Result};
pub use geotiff::GeoTiffSource;
pub use grid::{GridCell, TileGrid};
pub use ingester::{footprint, DirectoryReport, IngestPlan, Ingester, IngestionResult, UNKNOWN_SRID};
pub use source::{Affine, MemorySource, SourceReader};
