//! Pixel-level machinery for the raster pyramid.
//!
//! - [`canvas`]: owned true-colour buffers, transparent-aware painting,
//!   placeholder rectangles
//! - [`resample`]: integer shrink, fixed-point nearest neighbour, thumbnails
//! - [`codec`]: JPEG/PNG/GIF/TIFF encode and decode, colour classification
//! - [`png`]: PNG writer (grayscale, indexed, RGB)
//! - [`raw`]: raw RGB/RGBA/ARGB/BGR/BGRA arrays
//! - [`geotiff`]: georeferenced TIFF export

pub mod canvas;
pub mod codec;
pub mod geotiff;
pub mod png;
pub mod raw;
pub mod resample;

pub use canvas::Canvas;
pub use codec::{classify, decode, encode, encode_output, TileEncoding};
pub use geotiff::{GeoReference, GeoTiffWriter, SampleLayout};
pub use raw::to_raw;
pub use resample::{make_thumbnail, resize};
