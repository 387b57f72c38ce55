//! Store fixtures: temporary databases seeded with regular tile grids.

use std::path::PathBuf;

use raster_common::{BoundingBox, RasterResult};
use renderer::codec::{self, TileEncoding};
use renderer::Canvas;
use storage::{NewTile, RasterStore};

use crate::generators::tile_color;

/// Common extents in projected metres.
pub mod bbox {
    /// 1 km square anchored at the origin.
    pub const UNIT_KM: (f64, f64, f64, f64) = (0.0, 0.0, 1000.0, 1000.0);

    /// A UTM-ish orthophoto extent.
    pub const ORTHO: (f64, f64, f64, f64) = (500_000.0, 4_600_000.0, 502_048.0, 4_601_024.0);
}

/// A fresh store in a temporary directory. Keep the `TempDir` alive for as
/// long as the store is used.
pub async fn temp_store(prefix: &str) -> (tempfile::TempDir, PathBuf, RasterStore) {
    let dir = crate::paths::temp_test_dir();
    let path = dir.path().join("pyramid.sqlite");
    let store = RasterStore::create(&path, prefix)
        .await
        .expect("Failed to create temporary raster store");
    (dir, path, store)
}

/// A regular grid of equally sized tiles for one source at one level.
#[derive(Debug, Clone)]
pub struct GridSeed {
    pub source: String,
    /// Upper-left corner of the grid in map units.
    pub origin_x: f64,
    pub origin_y: f64,
    pub cols: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub pixel_size: f64,
    pub srid: i32,
    pub encoding: TileEncoding,
}

impl GridSeed {
    /// `cols x rows` tiles of 64x64 pixels at unit pixel size, PNG RGB.
    pub fn new(source: &str, cols: u32, rows: u32) -> Self {
        Self {
            source: source.to_string(),
            origin_x: 0.0,
            origin_y: rows as f64 * 64.0,
            cols,
            rows,
            tile_width: 64,
            tile_height: 64,
            pixel_size: 1.0,
            srid: 32632,
            encoding: TileEncoding::PngRgb,
        }
    }

    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin_x = x;
        self.origin_y = y;
        self
    }

    pub fn tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn pixel_size(mut self, size: f64) -> Self {
        self.pixel_size = size;
        self
    }

    pub fn encoding(mut self, encoding: TileEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Footprint of the tile at `(col, row)`.
    pub fn tile_bbox(&self, col: u32, row: u32) -> BoundingBox {
        let w = self.tile_width as f64 * self.pixel_size;
        let h = self.tile_height as f64 * self.pixel_size;
        let min_x = self.origin_x + col as f64 * w;
        let max_y = self.origin_y - row as f64 * h;
        BoundingBox::new(min_x, max_y - h, min_x + w, max_y)
    }

    pub fn extent(&self) -> BoundingBox {
        let w = self.cols as f64 * self.tile_width as f64 * self.pixel_size;
        let h = self.rows as f64 * self.tile_height as f64 * self.pixel_size;
        BoundingBox::new(self.origin_x, self.origin_y - h, self.origin_x + w, self.origin_y)
    }

    /// Write the grid with each tile a solid [`tile_color`].
    pub async fn write(&self, store: &RasterStore) -> RasterResult<Vec<i64>> {
        self.write_with(store, |col, row| {
            Canvas::filled(self.tile_width, self.tile_height, tile_color(col, row))
        })
        .await
    }

    /// Write the grid painting each tile with `paint(col, row)`, then
    /// refresh the level catalogue. Returns the ids in row-major order.
    pub async fn write_with<F>(&self, store: &RasterStore, paint: F) -> RasterResult<Vec<i64>>
    where
        F: Fn(u32, u32) -> Canvas,
    {
        let mut writer = store.begin().await?;
        let mut ids = Vec::with_capacity((self.cols * self.rows) as usize);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let blob = codec::encode(&paint(col, row), self.encoding, 90)?;
                let id = writer
                    .insert_tile(&NewTile {
                        source_name: &self.source,
                        tile_id: (row * self.cols + col) as i64,
                        width: self.tile_width,
                        height: self.tile_height,
                        pixel_x_size: self.pixel_size,
                        pixel_y_size: self.pixel_size,
                        bbox: self.tile_bbox(col, row),
                        srid: self.srid,
                        raster: &blob,
                    })
                    .await?;
                ids.push(id);
            }
        }
        writer.commit().await?;
        store.refresh_catalogue().await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_bboxes_tile_extent() {
        let seed = GridSeed::new("a.tif", 3, 2).origin(100.0, 500.0).pixel_size(2.0);
        let extent = seed.extent();
        assert_eq!(extent, BoundingBox::new(100.0, 244.0, 484.0, 500.0));
        assert_eq!(seed.tile_bbox(0, 0), BoundingBox::new(100.0, 372.0, 228.0, 500.0));
        assert_eq!(seed.tile_bbox(2, 1).max_x, extent.max_x);
        assert_eq!(seed.tile_bbox(2, 1).min_y, extent.min_y);
    }

    #[tokio::test]
    async fn test_seeded_store_catalogue() {
        let (_dir, _path, store) = temp_store("seed").await;
        let ids = GridSeed::new("a.tif", 2, 2).write(&store).await.unwrap();
        assert_eq!(ids.len(), 4);
        let levels = store.load_levels().await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].tile_count, 4);
    }
}
