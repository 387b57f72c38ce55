//! Requested view windows.

use raster_common::{BoundingBox, RasterError, RasterResult, MAX_RENDER_DIM, MIN_RENDER_DIM};

/// An output raster of `width x height` pixels covering `bbox`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl ViewWindow {
    /// Window centred on `(cx, cy)` with square pixels.
    pub fn centered(cx: f64, cy: f64, pixel_size: f64, width: u32, height: u32) -> Self {
        Self::centered_xy(cx, cy, pixel_size, pixel_size, width, height)
    }

    /// Window centred on `(cx, cy)` with separate X and Y pixel sizes.
    pub fn centered_xy(
        cx: f64,
        cy: f64,
        pixel_x_size: f64,
        pixel_y_size: f64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            bbox: BoundingBox::from_center(cx, cy, width, height, pixel_x_size, pixel_y_size),
            width,
            height,
            pixel_x_size,
            pixel_y_size,
        }
    }

    /// Window given by two opposite corners, reduced to its centre.
    #[allow(clippy::too_many_arguments)]
    pub fn from_rect(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        pixel_x_size: f64,
        pixel_y_size: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let (cx, cy) = BoundingBox::from_corners(x1, y1, x2, y2).center();
        Self::centered_xy(cx, cy, pixel_x_size, pixel_y_size, width, height)
    }

    /// Window anchored at the upper-left corner of `bbox`; the lower-right
    /// corner follows from the pixel counts.
    pub fn anchored(bbox: &BoundingBox, width: u32, height: u32, pixel_x_size: f64, pixel_y_size: f64) -> Self {
        Self {
            bbox: BoundingBox::new(
                bbox.min_x,
                bbox.max_y - height as f64 * pixel_y_size,
                bbox.min_x + width as f64 * pixel_x_size,
                bbox.max_y,
            ),
            width,
            height,
            pixel_x_size,
            pixel_y_size,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }

    /// Reject output sizes outside `64..=32768` on either axis, and pixel
    /// sizes that are not finite and positive.
    pub fn validate(&self) -> RasterResult<()> {
        validate_dimensions(self.width, self.height)?;
        self.validate_pixel_sizes()
    }

    pub fn validate_pixel_sizes(&self) -> RasterResult<()> {
        validate_pixel_size(self.pixel_x_size)?;
        validate_pixel_size(self.pixel_y_size)
    }
}

pub fn validate_pixel_size(pixel_size: f64) -> RasterResult<()> {
    if pixel_size.is_finite() && pixel_size > 0.0 {
        Ok(())
    } else {
        Err(RasterError::config(format!(
            "pixel size must be finite and > 0, got {}",
            pixel_size
        )))
    }
}

pub fn validate_dimensions(width: u32, height: u32) -> RasterResult<()> {
    let range = MIN_RENDER_DIM..=MAX_RENDER_DIM;
    if range.contains(&width) && range.contains(&height) {
        Ok(())
    } else {
        Err(RasterError::InvalidDimensions { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_bounds() {
        assert!(validate_dimensions(64, 64).is_ok());
        assert!(validate_dimensions(32768, 64).is_ok());
        assert!(validate_dimensions(63, 64).is_err());
        assert!(validate_dimensions(64, 32769).is_err());
    }

    #[test]
    fn test_dimension_error_message() {
        let err = validate_dimensions(10, 20).unwrap_err();
        assert_eq!(err.to_string(), "invalid raster dims [10h X 20v]");
    }

    #[test]
    fn test_pixel_size_bounds() {
        assert!(ViewWindow::centered(0.0, 0.0, 0.5, 64, 64).validate().is_ok());
        for bad in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let err = ViewWindow::centered_xy(0.0, 0.0, 1.0, bad, 64, 64)
                .validate()
                .unwrap_err();
            assert!(matches!(err, RasterError::Configuration(_)));
            assert!(ViewWindow::centered(0.0, 0.0, bad, 64, 64).validate().is_err());
        }
    }

    #[test]
    fn test_rect_equals_centered() {
        let a = ViewWindow::from_rect(200.0, 0.0, 0.0, 100.0, 2.0, 1.0, 100, 100);
        let b = ViewWindow::centered_xy(100.0, 50.0, 2.0, 1.0, 100, 100);
        assert_eq!(a, b);
        assert_eq!(a.bbox, BoundingBox::new(0.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn test_anchored_keeps_upper_left() {
        let w = ViewWindow::anchored(&BoundingBox::new(10.0, 0.0, 15.0, 20.0), 3, 4, 2.0, 2.0);
        assert_eq!(w.bbox, BoundingBox::new(10.0, 12.0, 16.0, 20.0));
    }
}
