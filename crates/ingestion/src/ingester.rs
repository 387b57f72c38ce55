//! Tile ingestion into a raster store.

use std::path::{Path, PathBuf};

use anyhow::Context;
use raster_common::{BoundingBox, RasterError, MAX_TILES_PER_SOURCE};
use renderer::codec::{self, TileEncoding};
use serde::Serialize;
use storage::{NewTile, RasterStore, TileWriter};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::IngestOptions;
use crate::error::{IngestionError, Result};
use crate::geotiff::GeoTiffSource;
use crate::grid::{GridCell, TileGrid};
use crate::source::SourceReader;

/// SRID stored when neither the source nor the options name one.
pub const UNKNOWN_SRID: i32 = -1;

/// Everything decided about a source before its tiles are written.
#[derive(Debug, Clone, Serialize)]
pub struct IngestPlan {
    pub source_name: String,
    pub layout: String,
    pub grid: TileGrid,
    pub extent: BoundingBox,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
    pub srid: i32,
    pub encoding: String,
}

/// Result of ingesting one source.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub plan: IngestPlan,
    /// Tiles committed; 0 for dry runs.
    pub tiles_written: usize,
    pub dry_run: bool,
}

/// Outcome of a directory ingestion. Each file is its own transaction, so
/// a failure leaves earlier files committed.
#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub loaded: Vec<IngestionResult>,
    pub failed: Vec<(PathBuf, IngestionError)>,
}

impl DirectoryReport {
    pub fn tiles_written(&self) -> usize {
        self.loaded.iter().map(|r| r.tiles_written).sum()
    }
}

/// Splits source rasters into tiles and writes them to one store prefix.
pub struct Ingester<'a> {
    store: &'a RasterStore,
    options: IngestOptions,
}

impl<'a> Ingester<'a> {
    pub fn new(store: &'a RasterStore, options: IngestOptions) -> Result<Self> {
        let options = options.normalized();
        options.validate().map_err(IngestionError::InvalidConfig)?;
        Ok(Self { store, options })
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingest one GeoTIFF; its path becomes the source name.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<IngestionResult> {
        let path = path.as_ref();
        let mut source = GeoTiffSource::open(path)?;
        self.ingest_source(&path.display().to_string(), &mut source).await
    }

    /// Ingest every `.tif` / `.tiff` file below `dir`, in file-name order.
    pub async fn ingest_dir(&self, dir: impl AsRef<Path>) -> Result<DirectoryReport> {
        let dir = dir.as_ref();
        let mut report = DirectoryReport::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("cannot access dir '{}'", dir.display()))?;
            if !entry.file_type().is_file() || !is_tiff(entry.path()) {
                continue;
            }
            match self.ingest_file(entry.path()).await {
                Ok(result) => report.loaded.push(result),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping source");
                    report.failed.push((entry.path().to_path_buf(), e));
                }
            }
        }

        info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            tiles = report.tiles_written(),
            "Directory ingestion finished"
        );
        Ok(report)
    }

    /// Work out the grid, footprints and encoding for `source`.
    pub fn plan<S: SourceReader>(&self, source_name: &str, source: &S) -> Result<IngestPlan> {
        let (width, height) = (source.width(), source.height());
        let grid = TileGrid::compute(width, height, self.options.tile_size)?;

        let (ul_x, ul_y) = source.pixel_to_map(0.0, 0.0);
        let (ur_x, _) = source.pixel_to_map(width as f64, 0.0);
        let (_, ll_y) = source.pixel_to_map(0.0, height as f64);
        let pixel_x_size = (ur_x - ul_x) / width as f64;
        let pixel_y_size = (ul_y - ll_y) / height as f64;
        if !(pixel_x_size > 0.0 && pixel_y_size > 0.0) {
            return Err(IngestionError::MissingGeoreference(format!(
                "{} has a non-positive pixel size ({}, {})",
                source_name, pixel_x_size, pixel_y_size
            )));
        }

        let encoding = TileEncoding::for_source(source.color_space(), self.options.format);
        Ok(IngestPlan {
            source_name: source_name.to_string(),
            layout: source.layout(),
            grid,
            extent: footprint(source, 0, 0, width, height),
            pixel_x_size,
            pixel_y_size,
            srid: self
                .options
                .epsg_override
                .or(source.epsg())
                .unwrap_or(UNKNOWN_SRID),
            encoding: encoding.to_string(),
        })
    }

    /// Tile `source` into the store inside a single transaction.
    ///
    /// The tile count limit is checked before anything is written; any
    /// failure while writing rolls the whole source back.
    pub async fn ingest_source<S: SourceReader>(
        &self,
        source_name: &str,
        source: &mut S,
    ) -> Result<IngestionResult> {
        let plan = self.plan(source_name, &*source)?;
        plan.grid.check_capacity(MAX_TILES_PER_SOURCE)?;

        info!(
            source = %source_name,
            layout = %plan.layout,
            tiles = plan.grid.tile_count(),
            tile_width = plan.grid.tile_width,
            tile_height = plan.grid.tile_height,
            pixel_x_size = plan.pixel_x_size,
            pixel_y_size = plan.pixel_y_size,
            srid = plan.srid,
            encoding = %plan.encoding,
            dry_run = self.options.dry_run,
            "Planned source ingestion"
        );

        if self.options.dry_run {
            return Ok(IngestionResult {
                plan,
                tiles_written: 0,
                dry_run: true,
            });
        }

        let encoding = TileEncoding::for_source(source.color_space(), self.options.format);
        let mut writer = self.store.begin().await?;
        if let Err(e) = self.write_tiles(&mut writer, &plan, encoding, source).await {
            if let Err(rollback) = writer.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            return Err(e);
        }
        let tiles_written = writer.commit().await?;
        self.store.refresh_catalogue().await?;

        info!(source = %source_name, tiles = tiles_written, "Source ingested");
        Ok(IngestionResult {
            plan,
            tiles_written,
            dry_run: false,
        })
    }

    async fn write_tiles<S: SourceReader>(
        &self,
        writer: &mut TileWriter,
        plan: &IngestPlan,
        encoding: TileEncoding,
        source: &mut S,
    ) -> Result<()> {
        for cell in plan.grid.cells() {
            let GridCell {
                index,
                x,
                y,
                width,
                height,
            } = cell;
            let image = source.read_window(x, y, width, height)?;
            let blob = codec::encode(&image, encoding, self.options.quality).map_err(|e| {
                IngestionError::Raster(RasterError::codec(format!("tile {}: {}", index, e)))
            })?;
            writer
                .insert_tile(&NewTile {
                    source_name: &plan.source_name,
                    tile_id: index as i64,
                    width,
                    height,
                    pixel_x_size: plan.pixel_x_size,
                    pixel_y_size: plan.pixel_y_size,
                    bbox: footprint(&*source, x, y, width, height),
                    srid: plan.srid,
                    raster: &blob,
                })
                .await?;
            debug!(tile = index, x, y, width, height, bytes = blob.len(), "Wrote tile");
        }
        Ok(())
    }
}

/// Map rectangle covered by a pixel window, from its four corners.
pub fn footprint<S: SourceReader + ?Sized>(
    source: &S,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> BoundingBox {
    let (x0, y0) = (x as f64, y as f64);
    let (x1, y1) = ((x + width) as f64, (y + height) as f64);
    let corners = [
        source.pixel_to_map(x0, y0),
        source.pixel_to_map(x1, y0),
        source.pixel_to_map(x0, y1),
        source.pixel_to_map(x1, y1),
    ];
    let mut bbox = BoundingBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
    for &(cx, cy) in &corners[1..] {
        bbox.min_x = bbox.min_x.min(cx);
        bbox.min_y = bbox.min_y.min(cy);
        bbox.max_x = bbox.max_x.max(cx);
        bbox.max_y = bbox.max_y.max(cy);
    }
    bbox
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tiff() {
        assert!(is_tiff(Path::new("a/b/ortho.TIF")));
        assert!(is_tiff(Path::new("ortho.tiff")));
        assert!(!is_tiff(Path::new("ortho.tfw")));
        assert!(!is_tiff(Path::new("README")));
    }
}
