//! Per-source pyramid levels built by merging 2x2 tile quads.

use raster_common::RasterError;
use renderer::{codec, make_thumbnail, Canvas, TileEncoding};
use serde::Serialize;
use storage::{NewTile, RasterStore, TileWriter};
use tracing::{debug, info};

use crate::config::PyramidConfig;
use crate::error::{PyramidError, Result};
use crate::matcher::NeighborMatcher;
use crate::quad::{plan_quads, Quad};

/// One level written (or planned) for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub level: u32,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub tiles: usize,
}

/// Levels built above one source's base tiles.
#[derive(Debug, Clone, Serialize)]
pub struct SourcePyramid {
    pub source_name: String,
    pub base_tiles: i64,
    pub levels: Vec<LevelSummary>,
}

/// Outcome of [`build_pyramids`].
#[derive(Debug, Clone, Serialize)]
pub struct PyramidReport {
    pub base_pixel_x_size: f64,
    pub base_pixel_y_size: f64,
    /// Tiles of earlier builds deleted before regenerating.
    pub purged: u64,
    pub sources: Vec<SourcePyramid>,
    pub dry_run: bool,
}

impl PyramidReport {
    pub fn tiles_written(&self) -> usize {
        self.sources
            .iter()
            .flat_map(|s| s.levels.iter())
            .map(|l| l.tiles)
            .sum()
    }
}

/// Build pyramid levels for every source at the finest pixel size, using
/// the neighbour matcher implied by `config`.
pub async fn build_pyramids(store: &RasterStore, config: &PyramidConfig) -> Result<PyramidReport> {
    let matcher = config.matcher();
    build_pyramids_with(store, config, matcher.as_ref()).await
}

/// [`build_pyramids`] with an explicit neighbour matcher.
///
/// Every tile coarser than the finest level is purged first. Each source
/// then gains levels of doubled pixel size, one transaction per level,
/// until a level holds a single tile. The catalogue is refreshed at the end.
pub async fn build_pyramids_with(
    store: &RasterStore,
    config: &PyramidConfig,
    matcher: &dyn NeighborMatcher,
) -> Result<PyramidReport> {
    let config = config.clone().normalized();
    config.validate().map_err(PyramidError::Config)?;
    let encoding = config.encoding()?;

    let (px, py) = store.min_pixel_size().await?.ok_or(PyramidError::NoSources)?;
    let sources = store.sources_at(px, py).await?;
    if sources.is_empty() {
        return Err(PyramidError::NoSources);
    }
    for (name, count) in &sources {
        info!(source = %name, tiles = count, "Raster source to be pyramidized");
    }

    let mut report = PyramidReport {
        base_pixel_x_size: px,
        base_pixel_y_size: py,
        purged: 0,
        sources: Vec::with_capacity(sources.len()),
        dry_run: config.dry_run,
    };

    if config.dry_run {
        for (name, count) in sources {
            let tiles = store.source_footprints(&name, px, py).await?;
            let quads = plan_quads(&name, &tiles, matcher)
                .map_err(|e| PyramidError::level_failed(&name, 1, e))?;
            report.sources.push(SourcePyramid {
                source_name: name,
                base_tiles: count,
                levels: vec![LevelSummary {
                    level: 1,
                    pixel_x_size: px * 2.0,
                    pixel_y_size: py * 2.0,
                    tiles: quads.len(),
                }],
            });
        }
        return Ok(report);
    }

    let mut writer = store.begin().await?;
    report.purged = writer.delete_coarser_than(px, py).await?;
    writer.commit().await?;
    if report.purged > 0 {
        info!(deleted = report.purged, "Deleted existing pyramid tiles");
    }

    for (name, count) in sources {
        let mut levels = Vec::new();
        let (mut level, mut lx, mut ly) = (1, px, py);
        loop {
            let tiles = build_level(store, &name, lx, ly, encoding, &config, matcher)
                .await
                .map_err(|e| PyramidError::level_failed(&name, level, e))?;
            info!(source = %name, level, tiles, "Pyramid level created");
            levels.push(LevelSummary {
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
        report.sources.push(SourcePyramid {
            source_name: name,
            base_tiles: count,
            levels,
        });
    }

    store.refresh_catalogue().await?;
    info!(
        sources = report.sources.len(),
        tiles = report.tiles_written(),
        matcher = matcher.name(),
        "Pyramids built"
    );
    Ok(report)
}

/// Merge the `(px, py)` tiles of one source into the next level, inside a
/// single transaction. Returns the number of tiles written.
async fn build_level(
    store: &RasterStore,
    source_name: &str,
    px: f64,
    py: f64,
    encoding: TileEncoding,
    config: &PyramidConfig,
    matcher: &dyn NeighborMatcher,
) -> Result<usize> {
    let mut writer = store.begin().await?;
    let tiles = writer.source_footprints(source_name, px, py).await?;
    let quads = plan_quads(source_name, &tiles, matcher)?;
    debug!(source = %source_name, tiles = tiles.len(), quads = quads.len(), "Planned quads");

    for (index, quad) in quads.iter().enumerate() {
        let srid = quad.check_geometry()?;
        let bbox = quad
            .footprint()
            .ok_or(RasterError::InvalidTilePattern(index as i64))?;
        let stitched = stitch(&mut writer, quad, config.background_color).await?;
        let thumbnail = make_thumbnail(&stitched);
        let blob = codec::encode(&thumbnail, encoding, config.quality)?;

        writer
            .insert_tile(&NewTile {
                source_name,
                tile_id: index as i64,
                width: thumbnail.width(),
                height: thumbnail.height(),
                pixel_x_size: px * 2.0,
                pixel_y_size: py * 2.0,
                bbox,
                srid,
                raster: &blob,
            })
            .await?;
    }

    Ok(writer.commit().await?)
}

/// Decode the quad's tiles into one image at their true offsets.
async fn stitch(writer: &mut TileWriter, quad: &Quad, background: u32) -> Result<Canvas> {
    let (width, height) = quad.canvas_size();
    let mut canvas = Canvas::filled(width, height, background);
    for (corner, tile) in quad.members() {
        let image = codec::decode(&writer.tile_blob(tile.id).await?)?;
        if (image.width(), image.height()) != (tile.width, tile.height) {
            return Err(RasterError::GeometryMismatch(format!(
                "tile {} decodes to {}x{}, metadata says {}x{}",
                tile.id,
                image.width(),
                image.height(),
                tile.width,
                tile.height
            ))
            .into());
        }
        let (x, y) = quad.offset(corner, tile);
        canvas.copy_from(&image, x, y, None);
    }
    Ok(canvas)
}
