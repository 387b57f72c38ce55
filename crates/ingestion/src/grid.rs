//! Tile grid over a source raster.

use raster_common::{RasterError, RasterResult};
use serde::Serialize;

/// Equal-sized tiles covering a `width x height` raster; the last column
/// and row are clipped to the raster edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileGrid {
    pub raster_width: u32,
    pub raster_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Division factor applied to both axes.
    pub sect: u32,
    pub cols: u32,
    pub rows: u32,
}

/// One tile of a [`TileGrid`], in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileGrid {
    /// Divide both axes by the smallest factor that brings each tile edge
    /// to at most `tile_size`, then widen tiles by one pixel where the
    /// integer division fell short of the raster.
    pub fn compute(width: u32, height: u32, tile_size: u32) -> RasterResult<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        if tile_size == 0 {
            return Err(RasterError::config("tile size must be > 0"));
        }

        let mut sect = 1;
        let (mut tile_width, mut tile_height) = (width, height);
        while tile_width > tile_size || tile_height > tile_size {
            sect += 1;
            tile_width = width / sect;
            tile_height = height / sect;
        }
        if tile_width * sect < width {
            tile_width += 1;
        }
        if tile_height * sect < height {
            tile_height += 1;
        }

        Ok(Self {
            raster_width: width,
            raster_height: height,
            tile_width,
            tile_height,
            sect,
            cols: width.div_ceil(tile_width),
            rows: height.div_ceil(tile_height),
        })
    }

    pub fn tile_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Fail before any write if the grid needs more than `limit` tiles.
    pub fn check_capacity(&self, limit: usize) -> RasterResult<()> {
        let count = self.tile_count();
        if count > limit {
            return Err(RasterError::TooManyTiles { count, limit });
        }
        Ok(())
    }

    pub fn cell(&self, col: u32, row: u32) -> GridCell {
        let x = col * self.tile_width;
        let y = row * self.tile_height;
        GridCell {
            index: (row * self.cols + col) as usize,
            x,
            y,
            width: self.tile_width.min(self.raster_width - x),
            height: self.tile_height.min(self.raster_height - y),
        }
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| self.cell(col, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile() {
        let grid = TileGrid::compute(300, 200, 512).unwrap();
        assert_eq!((grid.tile_width, grid.tile_height, grid.sect), (300, 200, 1));
        assert_eq!(grid.tile_count(), 1);
        let cell = grid.cell(0, 0);
        assert_eq!((cell.width, cell.height), (300, 200));
    }

    #[test]
    fn test_even_split() {
        let grid = TileGrid::compute(1000, 1000, 512).unwrap();
        assert_eq!((grid.tile_width, grid.sect, grid.cols), (500, 2, 2));
        assert_eq!(grid.tile_count(), 4);
    }

    #[test]
    fn test_uneven_split_widens_tiles() {
        let grid = TileGrid::compute(1001, 700, 512).unwrap();
        // 1001 / 2 = 500, 500 * 2 < 1001 so tiles grow to 501.
        assert_eq!(grid.sect, 2);
        assert_eq!(grid.tile_width, 501);
        assert_eq!(grid.tile_height, 350);
        assert_eq!(grid.cell(1, 0).width, 500);
    }

    #[test]
    fn test_cells_cover_raster_exactly() {
        for &(w, h, t) in &[(1001, 777, 128), (5000, 130, 256), (129, 4097, 512)] {
            let grid = TileGrid::compute(w, h, t).unwrap();
            assert!(grid.tile_width <= t + 1);
            let area: u64 = grid.cells().map(|c| c.width as u64 * c.height as u64).sum();
            assert_eq!(area, w as u64 * h as u64);
            assert_eq!(grid.cells().count(), grid.tile_count());
            assert!(grid.cells().all(|c| c.width > 0 && c.height > 0));
            assert_eq!(
                grid.tile_count(),
                (w.div_ceil(grid.tile_width) * h.div_ceil(grid.tile_height)) as usize
            );
        }
    }

    #[test]
    fn test_row_major_order() {
        let grid = TileGrid::compute(1000, 1000, 500).unwrap();
        let cells: Vec<_> = grid.cells().map(|c| (c.x, c.y)).collect();
        assert_eq!(cells, vec![(0, 0), (500, 0), (0, 500), (500, 500)]);
    }

    #[test]
    fn test_capacity() {
        let grid = TileGrid::compute(128 * 100, 128 * 100, 128).unwrap();
        assert_eq!(grid.tile_count(), 10_000);
        assert!(matches!(
            grid.check_capacity(8192),
            Err(RasterError::TooManyTiles { count: 10_000, limit: 8192 })
        ));
        assert!(TileGrid::compute(1000, 1000, 512).unwrap().check_capacity(8192).is_ok());
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(TileGrid::compute(0, 10, 512).is_err());
        assert!(TileGrid::compute(10, 10, 0).is_err());
    }
}
