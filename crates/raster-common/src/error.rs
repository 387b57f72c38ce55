//! Error types for the raster pyramid store.

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Coarse classification of a [`RasterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Codec,
    Store,
    CapacityExceeded,
    GeometryMismatch,
    Io,
}

/// Primary error type for raster store operations.
#[derive(Debug, Error)]
pub enum RasterError {
    // === Configuration Errors ===
    #[error("invalid raster dims [{width}h X {height}v]")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    // === Lookup Errors ===
    #[error("No resolution level available")]
    NoLevelAvailable,

    #[error("Not found: {0}")]
    NotFound(String),

    // === Codec Errors ===
    #[error("Codec error: {0}")]
    Codec(String),

    // === Storage Errors ===
    #[error("Store error: {0}")]
    Store(String),

    // === Capacity Errors ===
    #[error("Too many tiles: {count} required, limit is {limit}")]
    TooManyTiles { count: usize, limit: usize },

    // === Geometry Errors ===
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Invalid tile pattern near tile {0}")]
    InvalidTilePattern(i64),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RasterError {
    /// Get the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RasterError::InvalidDimensions { .. }
            | RasterError::Configuration(_)
            | RasterError::UnknownFormat(_) => ErrorCategory::Configuration,

            RasterError::NoLevelAvailable | RasterError::NotFound(_) => ErrorCategory::NotFound,

            RasterError::Codec(_) => ErrorCategory::Codec,
            RasterError::Store(_) => ErrorCategory::Store,
            RasterError::TooManyTiles { .. } => ErrorCategory::CapacityExceeded,

            RasterError::GeometryMismatch(_) | RasterError::InvalidTilePattern(_) => {
                ErrorCategory::GeometryMismatch
            }

            RasterError::Io(_) => ErrorCategory::Io,
        }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            RasterError::InvalidDimensions { width: 63, height: 64 }.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(RasterError::NoLevelAvailable.category(), ErrorCategory::NotFound);
        assert_eq!(
            RasterError::TooManyTiles { count: 9000, limit: 8192 }.category(),
            ErrorCategory::CapacityExceeded
        );
        assert_eq!(
            RasterError::InvalidTilePattern(7).category(),
            ErrorCategory::GeometryMismatch
        );
    }

    #[test]
    fn test_dimension_message() {
        let err = RasterError::InvalidDimensions { width: 63, height: 128 };
        assert_eq!(err.to_string(), "invalid raster dims [63h X 128v]");
    }
}
