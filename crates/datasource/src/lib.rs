//! Read access to a tiled raster pyramid.
//!
//! A [`DataSource`] wraps one table prefix of a store. Requests choose the
//! nearest stored level through [`select_level`] and are composited from
//! the tiles intersecting the [`ViewWindow`].

pub mod compositor;
pub mod handle;
pub mod planner;
pub mod window;

pub use compositor::{compose, compose_unchecked, render, Mosaic, PaintColors};
pub use handle::{DataSource, DataSourceInfo};
pub use planner::{select_level, AccessPlan};
pub use window::{validate_dimensions, validate_pixel_size, ViewWindow};
