//! Shared test utilities for the raster pyramid workspace.
//!
//! - Synthetic GeoTIFF sources written on the fly
//! - Pixel pattern generators with verifiable content
//! - Temporary stores seeded with tile grids
//! - Skip macros for optional real-world test data
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use geotiff::SyntheticGeoTiff;
pub use paths::*;

/// Skip a test if the named data file is not found.
///
/// ```ignore
/// let path = require_test_file!("orthophoto.tif");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Set TEST_DATA_DIR to run it.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate floating-point equality.
///
/// ```ignore
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        assert!(
            diff <= epsilon,
            "assertion failed: {} differs from {} by {} (epsilon {})",
            left,
            right,
            diff,
            epsilon
        );
    }};
}

/// Approximate equality of two bounding boxes, corner by corner.
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (l, r) = (&$left, &$right);
        $crate::assert_approx_eq!(l.min_x, r.min_x, $epsilon);
        $crate::assert_approx_eq!(l.min_y, r.min_y, $epsilon);
        $crate::assert_approx_eq!(l.max_x, r.max_x, $epsilon);
        $crate::assert_approx_eq!(l.max_y, r.max_y, $epsilon);
    }};
}
