//! Resolution level selection.

use raster_common::{AccessStrategy, RasterError, RasterResult, ResolutionLevel};
use serde::Serialize;

use crate::window::validate_pixel_size;

/// Level and query strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccessPlan {
    pub level: ResolutionLevel,
    pub strategy: AccessStrategy,
}

impl AccessPlan {
    pub fn pixel_x_size(&self) -> f64 {
        self.level.pixel_x_size
    }

    pub fn pixel_y_size(&self) -> f64 {
        self.level.pixel_y_size
    }
}

/// Pick the level whose X pixel size is nearest `requested_x`.
///
/// Levels are scanned in catalogue order and only a strictly smaller
/// distance replaces the current best, so ties go to the earliest level.
/// A pixel size that is not finite and positive is a configuration error.
pub fn select_level(levels: &[ResolutionLevel], requested_x: f64) -> RasterResult<AccessPlan> {
    validate_pixel_size(requested_x)?;
    let mut best: Option<(&ResolutionLevel, f64)> = None;
    for level in levels {
        let diff = (requested_x - level.pixel_x_size).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((level, diff)),
        }
    }

    let (level, _) = best.ok_or(RasterError::NoLevelAvailable)?;
    Ok(AccessPlan {
        level: *level,
        strategy: level.strategy(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<ResolutionLevel> {
        vec![
            ResolutionLevel::new(8.0, 8.0, 4),
            ResolutionLevel::new(4.0, 4.0, 16),
            ResolutionLevel::new(2.0, 2.0, 64),
            ResolutionLevel::new(1.0, 1.0, 1024),
        ]
    }

    #[test]
    fn test_empty_catalogue() {
        assert!(matches!(
            select_level(&[], 1.0),
            Err(RasterError::NoLevelAvailable)
        ));
    }

    #[test]
    fn test_rejects_invalid_pixel_size() {
        let levels = vec![ResolutionLevel::new(8.0, 8.0, 1), ResolutionLevel::new(1.0, 1.0, 64)];
        for requested in [f64::NAN, 0.0, -1.0, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                select_level(&levels, requested),
                Err(RasterError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_nearest_level() {
        assert_eq!(select_level(&levels(), 3.5).unwrap().pixel_x_size(), 4.0);
        assert_eq!(select_level(&levels(), 0.1).unwrap().pixel_x_size(), 1.0);
        assert_eq!(select_level(&levels(), 100.0).unwrap().pixel_x_size(), 8.0);
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        // 3.0 is equidistant from 4.0 and 2.0; 4.0 comes first.
        assert_eq!(select_level(&levels(), 3.0).unwrap().pixel_x_size(), 4.0);

        let mut reversed = levels();
        reversed.reverse();
        assert_eq!(select_level(&reversed, 3.0).unwrap().pixel_x_size(), 2.0);
    }

    #[test]
    fn test_strategy_follows_tile_count() {
        assert_eq!(
            select_level(&levels(), 1.0).unwrap().strategy,
            AccessStrategy::SpatialIndex
        );
        assert_eq!(
            select_level(&levels(), 2.0).unwrap().strategy,
            AccessStrategy::Scan
        );
    }

    #[test]
    fn test_minimal_distance_property() {
        let levels = levels();
        let mut requested = 0.25;
        while requested < 12.0 {
            let chosen = select_level(&levels, requested).unwrap();
            let best = (requested - chosen.pixel_x_size()).abs();
            assert!(levels
                .iter()
                .all(|l| (requested - l.pixel_x_size).abs() >= best));
            requested += 0.25;
        }
    }
}
