//! Shared-edge comparison for adjacent tiles.
//!
//! Tiles of one source are cut from the same affine arithmetic, so their
//! shared edges are bit-identical and exact comparison is the default.
//! [`ToleranceMatcher`] accepts stores whose footprints picked up rounding
//! noise, e.g. after being rewritten by other tools.

/// Decides whether two edge coordinates belong to the same edge.
pub trait NeighborMatcher: Send + Sync {
    fn same(&self, a: f64, b: f64) -> bool;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Exact floating-point equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl NeighborMatcher for ExactMatcher {
    fn same(&self, a: f64, b: f64) -> bool {
        a == b
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Equality within an absolute epsilon.
#[derive(Debug, Clone, Copy)]
pub struct ToleranceMatcher {
    epsilon: f64,
}

impl ToleranceMatcher {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.abs(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl NeighborMatcher for ToleranceMatcher {
    fn same(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.epsilon
    }

    fn name(&self) -> &'static str {
        "tolerance"
    }
}
