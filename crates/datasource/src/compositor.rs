//! Mosaic compositing of stored tiles into a view window.
//!
//! Tiles are painted in query order onto a background-filled canvas. Each
//! tile is scaled from its level's pixel size to the requested one and
//! placed by its upper-left corner; the canvas Y axis runs opposite to map Y.

use raster_common::{ColorSpace, RasterResult, ResolutionLevel};
use renderer::{codec, resample, Canvas};
use storage::{RasterStore, StoredTile};
use tracing::debug;

use crate::planner::AccessPlan;
use crate::window::ViewWindow;

/// Tiles magnified past this factor are drawn as a placeholder.
pub const MAX_MAGNIFICATION: u32 = 16;

/// Colours applied while painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintColors {
    /// Source pixels of this colour leave the canvas untouched.
    pub transparent: Option<u32>,
    pub background: u32,
}

impl Default for PaintColors {
    fn default() -> Self {
        Self {
            transparent: None,
            background: raster_common::color::BLACK,
        }
    }
}

/// A composed canvas and what went into it.
#[derive(Debug, Clone)]
pub struct Mosaic {
    pub canvas: Canvas,
    pub tiles_painted: usize,
    pub placeholders: usize,
}

impl Mosaic {
    /// Tiles that touched the window, whether painted or placeheld.
    pub fn hits(&self) -> usize {
        self.tiles_painted + self.placeholders
    }
}

/// Round half up.
pub fn int_round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// On-canvas size of a tile dimension: the scaled size plus one pixel to
/// close seams. Saturates at `u32::MAX`.
pub fn scaled_size(native: u32, level_pixel_size: f64, requested_pixel_size: f64) -> u32 {
    let scaled = int_round(native as f64 * level_pixel_size / requested_pixel_size);
    u32::try_from(scaled.max(0))
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

/// Canvas position of a tile's upper-left corner.
pub fn tile_offset(tile: &StoredTile, window: &ViewWindow) -> (i64, i64) {
    let fp = &tile.footprint;
    let x = (fp.min_x() - window.bbox.min_x) / window.pixel_x_size;
    let y = window.height as f64 - (fp.max_y() - window.bbox.min_y) / window.pixel_y_size;
    (int_round(x), int_round(y))
}

/// Paint `tiles` of `level` into a fresh canvas for `window`.
///
/// Any decode failure aborts the whole composition.
pub fn compose<I>(
    window: &ViewWindow,
    level: &ResolutionLevel,
    tiles: I,
    colors: PaintColors,
) -> RasterResult<Mosaic>
where
    I: IntoIterator<Item = StoredTile>,
{
    window.validate()?;
    compose_unchecked(window, level, tiles, colors)
}

/// [`compose`] without the output size bounds, for synthesis cells.
pub fn compose_unchecked<I>(
    window: &ViewWindow,
    level: &ResolutionLevel,
    tiles: I,
    colors: PaintColors,
) -> RasterResult<Mosaic>
where
    I: IntoIterator<Item = StoredTile>,
{
    window.validate_pixel_sizes()?;
    let mut canvas = Canvas::filled(window.width, window.height, colors.background);
    let mut tiles_painted = 0;
    let mut placeholders = 0;

    for tile in tiles {
        let fp = &tile.footprint;
        let new_width = scaled_size(fp.width, level.pixel_x_size, window.pixel_x_size);
        let new_height = scaled_size(fp.height, level.pixel_y_size, window.pixel_y_size);
        let (base_x, base_y) = tile_offset(&tile, window);

        if new_width > fp.width.saturating_mul(MAX_MAGNIFICATION)
            || new_height > fp.height.saturating_mul(MAX_MAGNIFICATION)
        {
            canvas.draw_placeholder(base_x, base_y, new_width, new_height);
            canvas.promote(ColorSpace::Grayscale);
            placeholders += 1;
            continue;
        }

        let image = codec::decode(&tile.raster)?;
        let image = resample::resize(&image, new_width, new_height);
        canvas.copy_from(&image, base_x, base_y, colors.transparent);
        canvas.promote(image.color_space());
        tiles_painted += 1;
    }

    Ok(Mosaic {
        canvas,
        tiles_painted,
        placeholders,
    })
}

/// Fetch the tiles `plan` selects for `window` and composite them.
pub async fn render(
    store: &RasterStore,
    window: &ViewWindow,
    plan: &AccessPlan,
    colors: PaintColors,
) -> RasterResult<Mosaic> {
    window.validate()?;
    let tiles = store
        .tiles_in_window(
            &window.bbox,
            plan.pixel_x_size(),
            plan.pixel_y_size(),
            plan.strategy,
        )
        .await?;
    let mosaic = compose_unchecked(window, &plan.level, tiles, colors)?;
    debug!(
        width = window.width,
        height = window.height,
        painted = mosaic.tiles_painted,
        placeholders = mosaic.placeholders,
        color_space = %mosaic.canvas.color_space(),
        "Composed mosaic"
    );
    Ok(mosaic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{BoundingBox, RasterError, TileFootprint};
    use renderer::codec::TileEncoding;

    fn stored(bbox: BoundingBox, canvas: &Canvas, encoding: TileEncoding) -> StoredTile {
        StoredTile {
            footprint: TileFootprint {
                id: 1,
                tile_id: 0,
                srid: 4326,
                bbox,
                width: canvas.width(),
                height: canvas.height(),
            },
            raster: codec::encode(canvas, encoding, 90).unwrap(),
        }
    }

    #[test]
    fn test_int_round_half_up() {
        assert_eq!(int_round(0.5), 1);
        assert_eq!(int_round(1.49), 1);
        assert_eq!(int_round(-0.5), 0);
        assert_eq!(int_round(-1.6), -2);
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(100, 1.0, 1.0), 101);
        assert_eq!(scaled_size(100, 1.0, 2.0), 51);
        assert_eq!(scaled_size(100, 2.0, 1.0), 201);
        assert_eq!(scaled_size(3, 1.0, 2.0), 3);
    }

    #[test]
    fn test_scaled_size_saturates() {
        assert_eq!(scaled_size(64, 1.0, 1e-9), u32::MAX);
        assert_eq!(scaled_size(u32::MAX, 2.0, 1.0), u32::MAX);
    }

    #[test]
    fn test_extreme_magnification_is_placeholder() {
        let window = ViewWindow::anchored(&BoundingBox::new(0.0, 0.0, 64.0, 64.0), 64, 64, 1e-9, 1e-9);
        let level = ResolutionLevel::new(1.0, 1.0, 1);
        let tile_img = Canvas::filled(8, 8, 0xff0000);
        let tile = stored(BoundingBox::new(0.0, 56.0, 8.0, 64.0), &tile_img, TileEncoding::PngRgb);

        let mosaic = compose(&window, &level, vec![tile], PaintColors::default()).unwrap();
        assert_eq!(mosaic.placeholders, 1);
        assert_eq!(mosaic.tiles_painted, 0);
    }

    #[test]
    fn test_tile_at_level_pixel_size_grows_by_one() {
        let window = ViewWindow::anchored(&BoundingBox::new(0.0, 0.0, 64.0, 64.0), 64, 64, 1.0, 1.0);
        let level = ResolutionLevel::new(1.0, 1.0, 1);
        let tile_img = Canvas::filled(8, 8, 0xff0000);
        let tile = stored(BoundingBox::new(10.0, 46.0, 18.0, 54.0), &tile_img, TileEncoding::PngRgb);

        let mosaic = compose(&window, &level, vec![tile], PaintColors::default()).unwrap();
        let c = &mosaic.canvas;
        assert_eq!(mosaic.tiles_painted, 1);
        assert_eq!(c.get(10, 10), Some(0xff0000));
        assert_eq!(c.get(17, 17), Some(0xff0000));
        assert_eq!(c.get(18, 10), Some(0xff0000));
        assert_eq!(c.get(10, 18), Some(0xff0000));
        assert_eq!(c.get(19, 10), Some(0));
        assert_eq!(c.get(10, 19), Some(0));
        assert_eq!(c.get(9, 10), Some(0));
        assert_eq!(c.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_empty_window_is_background() {
        let window = ViewWindow::centered(0.0, 0.0, 1.0, 64, 64);
        let level = ResolutionLevel::new(1.0, 1.0, 0);
        let colors = PaintColors {
            transparent: None,
            background: 0x123456,
        };
        let mosaic = compose(&window, &level, Vec::new(), colors).unwrap();
        assert!(mosaic.canvas.pixels().iter().all(|&p| p == 0x123456));
        assert_eq!(mosaic.canvas.color_space(), ColorSpace::Monochrome);
        assert_eq!(mosaic.hits(), 0);
    }

    #[test]
    fn test_rejects_small_output() {
        let window = ViewWindow::centered(0.0, 0.0, 1.0, 63, 64);
        let level = ResolutionLevel::new(1.0, 1.0, 0);
        assert!(compose(&window, &level, Vec::new(), PaintColors::default()).is_err());
    }

    #[test]
    fn test_rejects_bad_pixel_size() {
        let level = ResolutionLevel::new(1.0, 1.0, 0);
        for pixel_size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let window = ViewWindow::centered(0.0, 0.0, pixel_size, 64, 64);
            let err = compose_unchecked(&window, &level, Vec::new(), PaintColors::default()).unwrap_err();
            assert!(matches!(err, RasterError::Configuration(_)));
        }
    }
}
