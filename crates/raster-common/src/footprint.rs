//! Tile footprints and the in-memory footprint store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Geo-referenced rectangle and pixel size of one stored tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFootprint {
    /// Row id shared by the metadata and raster tables.
    pub id: i64,
    /// Position of the tile within its source or level.
    pub tile_id: i64,
    pub srid: i32,
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
}

impl TileFootprint {
    pub fn min_x(&self) -> f64 {
        self.bbox.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.bbox.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.bbox.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.bbox.max_y
    }

    /// Check that the footprint spans its pixels at the given resolution.
    pub fn matches_resolution(&self, pixel_x_size: f64, pixel_y_size: f64, tolerance: f64) -> bool {
        let expected_w = self.width as f64 * pixel_x_size;
        let expected_h = self.height as f64 * pixel_y_size;
        (self.bbox.width() - expected_w).abs() <= tolerance * expected_w.abs().max(1.0)
            && (self.bbox.height() - expected_h).abs() <= tolerance * expected_h.abs().max(1.0)
    }
}

/// Ordered collection of footprints with id lookup.
///
/// Working state for one ingestion or synthesis step; footprints keep
/// their insertion order.
#[derive(Debug, Default, Clone)]
pub struct FootprintStore {
    items: Vec<TileFootprint>,
    by_id: HashMap<i64, usize>,
}

impl FootprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            by_id: HashMap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, footprint: TileFootprint) -> usize {
        let index = self.items.len();
        self.by_id.insert(footprint.id, index);
        self.items.push(footprint);
        index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TileFootprint> {
        self.items.get(index)
    }

    pub fn by_id(&self, id: i64) -> Option<&TileFootprint> {
        self.by_id.get(&id).and_then(|&i| self.items.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileFootprint> {
        self.items.iter()
    }

    /// First footprint, in insertion order, satisfying `pred`.
    pub fn find<P>(&self, pred: P) -> Option<&TileFootprint>
    where
        P: FnMut(&&TileFootprint) -> bool,
    {
        self.items.iter().find(pred)
    }

    /// Union of all footprints.
    pub fn extent(&self) -> Option<BoundingBox> {
        let mut iter = self.items.iter();
        let first = iter.next()?.bbox;
        Some(iter.fold(first, |acc, fp| acc.union(&fp.bbox)))
    }
}

impl FromIterator<TileFootprint> for FootprintStore {
    fn from_iter<I: IntoIterator<Item = TileFootprint>>(iter: I) -> Self {
        let mut store = FootprintStore::new();
        for fp in iter {
            store.push(fp);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(id: i64, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> TileFootprint {
        TileFootprint {
            id,
            tile_id: id,
            srid: 4326,
            bbox: BoundingBox::new(min_x, min_y, max_x, max_y),
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn test_extent_and_lookup() {
        let store: FootprintStore = vec![fp(1, 0.0, 0.0, 10.0, 10.0), fp(7, 10.0, -5.0, 20.0, 5.0)]
            .into_iter()
            .collect();

        assert_eq!(store.len(), 2);
        assert_eq!(store.extent(), Some(BoundingBox::new(0.0, -5.0, 20.0, 10.0)));
        assert_eq!(store.by_id(7).map(|f| f.min_x()), Some(10.0));
        assert!(store.by_id(3).is_none());
        assert_eq!(store.find(|f| f.max_y() == 5.0).map(|f| f.id), Some(7));
    }

    #[test]
    fn test_empty_extent() {
        assert!(FootprintStore::new().extent().is_none());
    }

    #[test]
    fn test_matches_resolution() {
        let f = fp(1, 0.0, 0.0, 10.0, 10.0);
        assert!(f.matches_resolution(1.0, 1.0, 1e-9));
        assert!(!f.matches_resolution(2.0, 1.0, 1e-9));
    }
}
