//! Pyramid level synthesis for tiled raster stores.
//!
//! Two builders add coarser levels above the ingested tiles:
//!
//! - **Adjacency** ([`build_pyramids`]): per source, every 2x2 quad of
//!   neighbouring tiles is stitched and halved into one tile of the next
//!   level, until a source collapses to a single tile.
//! - **Topmost** ([`build_topmost_levels`]): above the coarsest per-source
//!   level, the union of all sources is re-cut into a regular grid and each
//!   cell is composited through a spatial query, so sources with unrelated
//!   tilings merge into one continuous pyramid.
//!
//! # Example
//!
//! ```ignore
//! use pyramid::{build_pyramids, build_topmost_levels, PyramidConfig};
//!
//! let config = PyramidConfig::from_env();
//! build_pyramids(&store, &config).await?;
//! build_topmost_levels(&store, &config).await?;
//! ```

pub mod adjacency;
pub mod config;
pub mod error;
pub mod matcher;
pub mod quad;
pub mod topmost;

pub use adjacency::{
    build_pyramids, build_pyramids_with, LevelSummary, PyramidReport, SourcePyramid,
};
pub use config::{PyramidConfig, DEFAULT_TOPMOST_TILE_SIZE};
pub use error::{PyramidError, Result};
pub use matcher::{ExactMatcher, NeighborMatcher, ToleranceMatcher};
pub use quad::{plan_quads, Corner, Quad, QuadShape};
pub use topmost::{build_topmost_levels, TopmostPlan, TopmostReport};
