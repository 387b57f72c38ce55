//! Coarse levels shared by all sources, rebuilt from level extents.
//!
//! Above the per-source pyramids the footprints of different sources no
//! longer line up, so each level is cut into a regular grid over the
//! extent of the level below and every cell is composited through a
//! spatial query.

use datasource::{compose_unchecked, PaintColors, ViewWindow};
use ingestion::{GridCell, TileGrid};
use raster_common::{AccessStrategy, BoundingBox, RasterError, ResolutionLevel, TOPMOST_SOURCE};
use renderer::{codec, make_thumbnail, TileEncoding};
use serde::Serialize;
use storage::{NewTile, RasterStore};
use tracing::{debug, info, warn};

use crate::adjacency::LevelSummary;
use crate::config::PyramidConfig;
use crate::error::{PyramidError, Result};

/// Cell layout for one topmost level.
#[derive(Debug, Clone, Serialize)]
pub struct TopmostPlan {
    /// Pixel size of the level being read.
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub extent: BoundingBox,
    pub grid: TileGrid,
}

impl TopmostPlan {
    /// Cover `extent` at `(px, py)` with cells of at most
    /// `2 * tile_size` pixels.
    pub fn compute(extent: BoundingBox, px: f64, py: f64, tile_size: u32) -> Result<Self> {
        let pixel_width = pixel_span(extent.width(), px);
        let pixel_height = pixel_span(extent.height(), py);
        let grid = TileGrid::compute(pixel_width, pixel_height, tile_size * 2)?;
        Ok(Self {
            pixel_x_size: px,
            pixel_y_size: py,
            extent,
            grid,
        })
    }

    /// Map rectangle of `cell`, clipped to the extent.
    pub fn cell_bbox(&self, cell: &GridCell) -> BoundingBox {
        let e = &self.extent;
        let min_x = e.min_x + cell.x as f64 * self.pixel_x_size;
        let max_x = (e.min_x + (cell.x + cell.width) as f64 * self.pixel_x_size).min(e.max_x);
        let max_y = e.max_y - cell.y as f64 * self.pixel_y_size;
        let min_y = (e.max_y - (cell.y + cell.height) as f64 * self.pixel_y_size).max(e.min_y);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

/// Whole pixels needed to span `length` map units; never less than one.
fn pixel_span(length: f64, pixel_size: f64) -> u32 {
    let mut pixels = (length / pixel_size) as u32;
    if (pixels as f64) * pixel_size < length {
        pixels += 1;
    }
    pixels.max(1)
}

/// Outcome of [`build_topmost_levels`].
#[derive(Debug, Clone, Serialize)]
pub struct TopmostReport {
    /// Pixel size the first topmost level was built from.
    pub start_pixel_x_size: f64,
    pub start_pixel_y_size: f64,
    pub purged: u64,
    /// Levels written; in dry runs, the cells planned for the first level.
    pub levels: Vec<LevelSummary>,
    pub dry_run: bool,
}

impl TopmostReport {
    pub fn tiles_written(&self) -> usize {
        if self.dry_run {
            return 0;
        }
        self.levels.iter().map(|l| l.tiles).sum()
    }
}

/// Build `TopMost` levels above the coarsest per-source level.
///
/// Existing tiles coarser than that level are purged first. Each iteration
/// reads the previous level, writes one tile per populated cell with
/// doubled pixel size, and stops once a level has at most one tile.
pub async fn build_topmost_levels(
    store: &RasterStore,
    config: &PyramidConfig,
) -> Result<TopmostReport> {
    let config = config.clone().normalized();
    config.validate().map_err(PyramidError::Config)?;
    let encoding = config.encoding()?;

    let (px, py) = store
        .max_source_pixel_size()
        .await?
        .ok_or(PyramidError::NoSources)?;
    if store.min_pixel_size().await? == Some((px, py)) {
        warn!("Only one pixel size is stored; build_pyramids has probably not run yet");
    }

    let mut report = TopmostReport {
        start_pixel_x_size: px,
        start_pixel_y_size: py,
        purged: 0,
        levels: Vec::new(),
        dry_run: config.dry_run,
    };

    if config.dry_run {
        if let Some(extent) = store.level_extent(px, py).await? {
            let plan = TopmostPlan::compute(extent, px, py, config.tile_size)?;
            info!(
                cells = plan.grid.tile_count(),
                cell_width = plan.grid.tile_width,
                cell_height = plan.grid.tile_height,
                "Planned first topmost level"
            );
            report.levels.push(LevelSummary {
                level: 1,
                pixel_x_size: px * 2.0,
                pixel_y_size: py * 2.0,
                tiles: plan.grid.tile_count(),
            });
        }
        return Ok(report);
    }

    let mut writer = store.begin().await?;
    report.purged = writer.delete_coarser_than(px, py).await?;
    writer.commit().await?;
    if report.purged > 0 {
        info!(deleted = report.purged, "Deleted existing topmost tiles");
    }

    let colors = PaintColors {
        transparent: config.transparent_color,
        background: config.background_color,
    };
    let (mut level, mut lx, mut ly) = (1, px, py);
    while let Some(extent) = store.level_extent(lx, ly).await? {
        let plan = TopmostPlan::compute(extent, lx, ly, config.tile_size)?;
        let tiles = build_level(store, &plan, encoding, config.quality, colors)
            .await
            .map_err(|e| PyramidError::level_failed(TOPMOST_SOURCE, level, e))?;
        info!(
            level,
            cells = plan.grid.tile_count(),
            tiles,
            "Topmost level created"
        );
        report.levels.push(LevelSummary {
            level,
            pixel_x_size: lx * 2.0,
            pixel_y_size: ly * 2.0,
            tiles,
        });
        if tiles <= 1 {
            break;
        }
        level += 1;
        lx *= 2.0;
        ly *= 2.0;
    }

    store.refresh_catalogue().await?;
    Ok(report)
}

/// Composite and thumbnail every populated cell of `plan` in one
/// transaction. Returns the number of tiles written.
async fn build_level(
    store: &RasterStore,
    plan: &TopmostPlan,
    encoding: TileEncoding,
    quality: u8,
    colors: PaintColors,
) -> Result<usize> {
    let (px, py) = (plan.pixel_x_size, plan.pixel_y_size);
    let level = ResolutionLevel::new(px, py, 0);
    let mut writer = store.begin().await?;

    for cell in plan.grid.cells() {
        let bbox = plan.cell_bbox(&cell);
        let tiles = writer
            .tiles_in_window(&bbox, px, py, AccessStrategy::SpatialIndex)
            .await?;
        let Some(srid) = tiles.first().map(|t| t.footprint.srid) else {
            continue;
        };
        if let Some(other) = tiles.iter().find(|t| t.footprint.srid != srid) {
            return Err(RasterError::GeometryMismatch(format!(
                "cell {} mixes SRIDs {} and {}",
                cell.index, srid, other.footprint.srid
            ))
            .into());
        }

        let window = ViewWindow::anchored(&bbox, cell.width, cell.height, px, py);
        let mosaic = compose_unchecked(&window, &level, tiles, colors)?;
        let thumbnail = make_thumbnail(&mosaic.canvas);
        let blob = codec::encode(&thumbnail, encoding, quality)?;
        writer
            .insert_tile(&NewTile {
                source_name: TOPMOST_SOURCE,
                tile_id: cell.index as i64,
                width: thumbnail.width(),
                height: thumbnail.height(),
                pixel_x_size: px * 2.0,
                pixel_y_size: py * 2.0,
                bbox,
                srid,
                raster: &blob,
            })
            .await?;
        debug!(cell = cell.index, hits = mosaic.hits(), "Wrote topmost tile");
    }

    Ok(writer.commit().await?)
}
