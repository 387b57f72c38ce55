//! Open raster pyramid handle.

use std::path::{Path, PathBuf};

use raster_common::{
    BoundingBox, ImageFormat, RasterError, RasterResult, RawFormat, ResolutionLevel,
};
use renderer::{codec, GeoReference, GeoTiffWriter};
use serde::Serialize;
use storage::RasterStore;
use tracing::{debug, info, warn};

use crate::compositor::{self, Mosaic, PaintColors};
use crate::planner::{select_level, AccessPlan};
use crate::window::ViewWindow;

/// Summary of an open pyramid, for drivers.
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceInfo {
    pub path: String,
    pub table_prefix: String,
    pub srid: Option<i32>,
    pub extent: Option<BoundingBox>,
    pub levels: Vec<ResolutionLevel>,
    pub transparent_color: Option<String>,
    pub background_color: String,
    pub sqlite_version: String,
}

/// A raster pyramid opened for reading.
///
/// Operations take `&mut self` and record their failure, if any, as the
/// handle's last error. A successful call clears it.
pub struct DataSource {
    store: RasterStore,
    path: PathBuf,
    levels: Vec<ResolutionLevel>,
    srid: Option<i32>,
    transparent: Option<u32>,
    background: u32,
    last_error: Option<String>,
}

impl DataSource {
    /// Open the pyramid stored under `prefix` in the database at `path`.
    pub async fn open(path: impl AsRef<Path>, prefix: &str) -> RasterResult<Self> {
        let path = path.as_ref();
        let store = RasterStore::open(path, prefix).await?;
        Self::from_store(store, path.to_path_buf()).await
    }

    /// Wrap an already connected store.
    pub async fn from_store(store: RasterStore, path: PathBuf) -> RasterResult<Self> {
        store.validate().await?;
        let levels = store.load_levels().await?;
        if levels.is_empty() {
            return Err(RasterError::NotFound(format!(
                "no valid pyramid level for '{}'",
                store.table_prefix()
            )));
        }
        let srid = store.srid().await?;

        info!(
            path = %path.display(),
            table = store.table_prefix(),
            levels = levels.len(),
            srid = ?srid,
            "Opened raster pyramid"
        );

        Ok(Self {
            store,
            path,
            levels,
            srid,
            transparent: None,
            background: raster_common::color::BLACK,
            last_error: None,
        })
    }

    pub async fn close(self) {
        debug!(path = %self.path.display(), "Closing raster pyramid");
        self.store.close().await;
    }

    fn record<T>(&mut self, result: RasterResult<T>) -> RasterResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!(error = %e, table = self.store.table_prefix(), "Raster pyramid operation failed");
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Message of the most recent failure, if the last call failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table_prefix(&self) -> &str {
        self.store.table_prefix()
    }

    pub fn store(&self) -> &RasterStore {
        &self.store
    }

    /// Resolution levels, coarsest first.
    pub fn levels(&self) -> &[ResolutionLevel] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level at `index` in catalogue order.
    pub fn resolution(&mut self, index: usize) -> RasterResult<ResolutionLevel> {
        let result = self.levels.get(index).copied().ok_or_else(|| {
            RasterError::NotFound(format!(
                "invalid pyramid level {} (of {})",
                index,
                self.levels.len()
            ))
        });
        self.record(result)
    }

    pub fn srid(&self) -> Option<i32> {
        self.srid
    }

    /// Bounding box of every stored tile.
    pub async fn extent(&mut self) -> RasterResult<BoundingBox> {
        let result = self
            .store
            .extent()
            .await
            .and_then(|e| e.ok_or_else(|| RasterError::NotFound("empty raster pyramid".to_string())));
        self.record(result)
    }

    /// Level and strategy a request at `pixel_size` would use.
    pub fn best_access(&mut self, pixel_size: f64) -> RasterResult<AccessPlan> {
        let result = select_level(&self.levels, pixel_size);
        self.record(result)
    }

    pub fn set_transparent_color(&mut self, color: Option<u32>) {
        self.transparent = color.map(|c| c & 0xffffff);
    }

    pub fn transparent_color(&self) -> Option<u32> {
        self.transparent
    }

    pub fn has_transparent_color(&self) -> bool {
        self.transparent.is_some()
    }

    pub fn set_background_color(&mut self, color: u32) {
        self.background = color & 0xffffff;
    }

    pub fn background_color(&self) -> u32 {
        self.background
    }

    fn colors(&self) -> PaintColors {
        PaintColors {
            transparent: self.transparent,
            background: self.background,
        }
    }

    pub async fn sqlite_version(&mut self) -> RasterResult<String> {
        let result = self.store.sqlite_version().await;
        self.record(result)
    }

    pub async fn info(&mut self) -> RasterResult<DataSourceInfo> {
        let result = self.collect_info().await;
        self.record(result)
    }

    async fn collect_info(&self) -> RasterResult<DataSourceInfo> {
        Ok(DataSourceInfo {
            path: self.path.display().to_string(),
            table_prefix: self.store.table_prefix().to_string(),
            srid: self.srid,
            extent: self.store.extent().await?,
            levels: self.levels.clone(),
            transparent_color: self.transparent.map(raster_common::color::format_hex_color),
            background_color: raster_common::color::format_hex_color(self.background),
            sqlite_version: self.store.sqlite_version().await?,
        })
    }

    async fn compose(&self, window: &ViewWindow) -> RasterResult<Mosaic> {
        window.validate()?;
        let plan = select_level(&self.levels, window.pixel_x_size)?;
        compositor::render(&self.store, window, &plan, self.colors()).await
    }

    /// Composite `window` into a canvas without encoding it.
    pub async fn render_canvas(&mut self, window: &ViewWindow) -> RasterResult<Mosaic> {
        let result = self.compose(window).await;
        self.record(result)
    }

    /// Composite `window` and encode it as `format`.
    pub async fn render_window(
        &mut self,
        window: &ViewWindow,
        format: ImageFormat,
        quality: u8,
    ) -> RasterResult<Vec<u8>> {
        let result = match self.compose(window).await {
            Ok(mosaic) => codec::encode_output(&mosaic.canvas, format, quality.clamp(1, 100)),
            Err(e) => Err(e),
        };
        self.record(result)
    }

    /// [`render_window`](Self::render_window) for a window given by two
    /// opposite corners.
    #[allow(clippy::too_many_arguments)]
    pub async fn render_window_by_rect(
        &mut self,
        corners: (f64, f64, f64, f64),
        pixel_x_size: f64,
        pixel_y_size: f64,
        width: u32,
        height: u32,
        format: ImageFormat,
        quality: u8,
    ) -> RasterResult<Vec<u8>> {
        let (x1, y1, x2, y2) = corners;
        let window = ViewWindow::from_rect(x1, y1, x2, y2, pixel_x_size, pixel_y_size, width, height);
        self.render_window(&window, format, quality).await
    }

    /// Composite `window` into a raw interleaved pixel array.
    pub async fn render_raw(&mut self, window: &ViewWindow, format: RawFormat) -> RasterResult<Vec<u8>> {
        let transparent = self.transparent;
        let result = self
            .compose(window)
            .await
            .map(|mosaic| renderer::to_raw(&mosaic.canvas, format, transparent));
        self.record(result)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn render_raw_by_rect(
        &mut self,
        corners: (f64, f64, f64, f64),
        pixel_x_size: f64,
        pixel_y_size: f64,
        width: u32,
        height: u32,
        format: RawFormat,
    ) -> RasterResult<Vec<u8>> {
        let (x1, y1, x2, y2) = corners;
        let window = ViewWindow::from_rect(x1, y1, x2, y2, pixel_x_size, pixel_y_size, width, height);
        self.render_raw(&window, format).await
    }

    /// Composite `window` and write it as a georeferenced TIFF.
    pub async fn export_geotiff(&mut self, path: impl AsRef<Path>, window: &ViewWindow) -> RasterResult<()> {
        let result = match self.compose(window).await {
            Ok(mosaic) => {
                let (cx, cy) = window.center();
                let georef = GeoReference::from_center(
                    cx,
                    cy,
                    window.width,
                    window.height,
                    window.pixel_x_size,
                    window.pixel_y_size,
                    self.srid,
                );
                GeoTiffWriter::new(&mosaic.canvas, georef).write(path.as_ref())
            }
            Err(e) => Err(e),
        };
        self.record(result)
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("path", &self.path)
            .field("table_prefix", &self.store.table_prefix())
            .field("levels", &self.levels.len())
            .field("srid", &self.srid)
            .finish()
    }
}
