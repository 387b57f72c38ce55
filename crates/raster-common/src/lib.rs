//! Common types shared across the raster pyramid crates.

pub mod bbox;
pub mod color;
pub mod error;
pub mod footprint;
pub mod format;
pub mod level;

pub use bbox::BoundingBox;
pub use color::{parse_hex_color, true_color, ColorSpace};
pub use error::{ErrorCategory, RasterError, RasterResult};
pub use footprint::{FootprintStore, TileFootprint};
pub use format::{ImageFormat, RawFormat};
pub use level::{AccessStrategy, ResolutionLevel};

/// Reserved source name for tiles built by the topmost synthesizer.
pub const TOPMOST_SOURCE: &str = "TopMost";

/// Smallest accepted output width or height.
pub const MIN_RENDER_DIM: u32 = 64;

/// Largest accepted output width or height.
pub const MAX_RENDER_DIM: u32 = 32768;

/// Compatibility ceiling on tiles per ingested file.
pub const MAX_TILES_PER_SOURCE: usize = 8192;
