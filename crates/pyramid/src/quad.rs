//! Grouping of one level's tiles into 2x2 quads.
//!
//! A quad is addressed by the point where its four tiles meet: the
//! lower-right corner of the upper-left tile. Walking starts at the tile
//! in the upper-left corner of the source extent and proceeds row by row.

use raster_common::{BoundingBox, FootprintStore, RasterError, RasterResult, TileFootprint};
use serde::Serialize;

use crate::error::{PyramidError, Result};
use crate::matcher::NeighborMatcher;

/// Position of a tile inside its quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

/// Which quad positions are occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadShape {
    /// All four tiles.
    Full,
    /// Upper-left and lower-left (last column).
    LeftPair,
    /// Upper-left and upper-right (last row).
    TopPair,
    /// Upper-left only (last row and column).
    Single,
}

/// Up to four tiles meeting at one point.
#[derive(Debug, Clone, Default)]
pub struct Quad {
    pub upper_left: Option<TileFootprint>,
    pub upper_right: Option<TileFootprint>,
    pub lower_left: Option<TileFootprint>,
    pub lower_right: Option<TileFootprint>,
}

/// The tile touching `(x, y)` from `corner`'s side.
pub fn find_corner<'a>(
    tiles: &'a FootprintStore,
    x: f64,
    y: f64,
    corner: Corner,
    matcher: &dyn NeighborMatcher,
) -> Option<&'a TileFootprint> {
    tiles.find(|t| match corner {
        Corner::UpperLeft => matcher.same(t.max_x(), x) && matcher.same(t.min_y(), y),
        Corner::UpperRight => matcher.same(t.min_x(), x) && matcher.same(t.min_y(), y),
        Corner::LowerLeft => matcher.same(t.max_x(), x) && matcher.same(t.max_y(), y),
        Corner::LowerRight => matcher.same(t.min_x(), x) && matcher.same(t.max_y(), y),
    })
}

impl Quad {
    /// Collect the tiles meeting at `(x, y)`.
    pub fn around(tiles: &FootprintStore, x: f64, y: f64, matcher: &dyn NeighborMatcher) -> Self {
        let pick = |corner| find_corner(tiles, x, y, corner, matcher).cloned();
        Self {
            upper_left: pick(Corner::UpperLeft),
            upper_right: pick(Corner::UpperRight),
            lower_left: pick(Corner::LowerLeft),
            lower_right: pick(Corner::LowerRight),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members().next().is_none()
    }

    /// Occupied positions, upper-left first.
    pub fn members(&self) -> impl Iterator<Item = (Corner, &TileFootprint)> {
        [
            (Corner::UpperLeft, self.upper_left.as_ref()),
            (Corner::UpperRight, self.upper_right.as_ref()),
            (Corner::LowerLeft, self.lower_left.as_ref()),
            (Corner::LowerRight, self.lower_right.as_ref()),
        ]
        .into_iter()
        .filter_map(|(corner, tile)| tile.map(|t| (corner, t)))
    }

    pub fn shape(&self) -> RasterResult<QuadShape> {
        match (
            &self.upper_left,
            &self.upper_right,
            &self.lower_left,
            &self.lower_right,
        ) {
            (Some(_), Some(_), Some(_), Some(_)) => Ok(QuadShape::Full),
            (Some(_), None, Some(_), None) => Ok(QuadShape::LeftPair),
            (Some(_), Some(_), None, None) => Ok(QuadShape::TopPair),
            (Some(_), None, None, None) => Ok(QuadShape::Single),
            _ => Err(RasterError::InvalidTilePattern(
                self.members().map(|(_, t)| t.id).next().unwrap_or(-1),
            )),
        }
    }

    /// Check that stitched edges agree in length and all tiles share one
    /// SRID, which is returned.
    pub fn check_geometry(&self) -> RasterResult<i32> {
        self.shape()?;
        let pairs = [
            (&self.upper_left, &self.lower_left, Axis::Width),
            (&self.upper_right, &self.lower_right, Axis::Width),
            (&self.upper_left, &self.upper_right, Axis::Height),
            (&self.lower_left, &self.lower_right, Axis::Height),
        ];
        for (a, b, axis) in pairs {
            if let (Some(a), Some(b)) = (a, b) {
                let (da, db) = match axis {
                    Axis::Width => (a.width, b.width),
                    Axis::Height => (a.height, b.height),
                };
                if da != db {
                    return Err(RasterError::GeometryMismatch(format!(
                        "mismatching tile sizes [{}] tile ids {} and {}",
                        axis.as_str(),
                        a.id,
                        b.id
                    )));
                }
            }
        }

        let mut srids = self.members().map(|(_, t)| t.srid);
        let first = srids.next().ok_or(RasterError::InvalidTilePattern(-1))?;
        if srids.any(|s| s != first) {
            let ids: Vec<String> = self.members().map(|(_, t)| t.id.to_string()).collect();
            return Err(RasterError::GeometryMismatch(format!(
                "mismatching SRIDs in tiles {}",
                ids.join(", ")
            )));
        }
        Ok(first)
    }

    /// Union of the member footprints.
    pub fn footprint(&self) -> Option<BoundingBox> {
        self.members()
            .map(|(_, t)| t.bbox)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Pixel size of the stitched image.
    pub fn canvas_size(&self) -> (u32, u32) {
        let w = |t: &Option<TileFootprint>| t.as_ref().map_or(0, |t| t.width);
        let h = |t: &Option<TileFootprint>| t.as_ref().map_or(0, |t| t.height);
        (
            w(&self.upper_left) + w(&self.upper_right),
            h(&self.upper_left) + h(&self.lower_left),
        )
    }

    /// Top-left pixel of a member inside the stitched image. Right and
    /// bottom members are aligned to the image's right and bottom edges.
    pub fn offset(&self, corner: Corner, tile: &TileFootprint) -> (i64, i64) {
        let (width, height) = self.canvas_size();
        let right = width as i64 - tile.width as i64;
        let bottom = height as i64 - tile.height as i64;
        match corner {
            Corner::UpperLeft => (0, 0),
            Corner::UpperRight => (right, 0),
            Corner::LowerLeft => (0, bottom),
            Corner::LowerRight => (right, bottom),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Width,
    Height,
}

impl Axis {
    fn as_str(self) -> &'static str {
        match self {
            Axis::Width => "Width",
            Axis::Height => "Height",
        }
    }
}

/// Group a source's tiles into quads, row by row from the upper-left.
///
/// After each quad the walk continues with the tile right of the quad's
/// upper-right member; when the row is exhausted it restarts at the
/// extent's left edge below the quad's lower members.
pub fn plan_quads(
    source_name: &str,
    tiles: &FootprintStore,
    matcher: &dyn NeighborMatcher,
) -> Result<Vec<Quad>> {
    let Some(extent) = tiles.extent() else {
        return Ok(Vec::new());
    };

    let first = tiles
        .find(|t| matcher.same(t.min_x(), extent.min_x) && matcher.same(t.max_y(), extent.max_y))
        .ok_or_else(|| PyramidError::FirstTileNotFound(source_name.to_string()))?;
    let (mut x, mut y) = (first.max_x(), first.min_y());

    let mut quads = Vec::new();
    loop {
        let quad = Quad::around(tiles, x, y, matcher);
        if quad.is_empty() || quads.len() >= tiles.len() {
            break;
        }

        let row_right = match (&quad.upper_right, &quad.lower_right) {
            (Some(t), _) => Some((t.max_x(), t.min_y())),
            (None, Some(t)) => Some((t.max_x(), t.max_y())),
            _ => None,
        };
        let next_row = match (&quad.lower_left, &quad.lower_right) {
            (Some(t), _) | (None, Some(t)) => Some(t.min_y()),
            _ => None,
        };
        quads.push(quad);

        let next = row_right
            .and_then(|(rx, ry)| {
                tiles.find(|t| matcher.same(t.min_x(), rx) && matcher.same(t.min_y(), ry))
            })
            .or_else(|| {
                next_row.and_then(|ny| {
                    tiles.find(|t| {
                        matcher.same(t.min_x(), extent.min_x) && matcher.same(t.max_y(), ny)
                    })
                })
            });
        match next {
            Some(t) => (x, y) = (t.max_x(), t.min_y()),
            None => break,
        }
    }
    Ok(quads)
}
