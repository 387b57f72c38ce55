//! Error types for pyramid synthesis.

use raster_common::RasterError;
use thiserror::Error;

/// Errors that can occur while building pyramid levels.
#[derive(Error, Debug)]
pub enum PyramidError {
    /// The store holds no tiles to start from.
    #[error("there is no raster source to be pyramidized")]
    NoSources,

    /// The tile at the upper-left corner of a source's extent is missing.
    #[error("first tile [uppermost, leftmost] not found in source '{0}'")]
    FirstTileNotFound(String),

    /// One level of one source failed; nothing of that level was kept.
    #[error("source '{source_name}' level {level}: {cause}")]
    LevelFailed {
        source_name: String,
        level: u32,
        cause: Box<PyramidError>,
    },

    /// Invalid builder configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl PyramidError {
    /// Wrap `cause` with the source and level it happened in.
    pub fn level_failed(source_name: impl Into<String>, level: u32, cause: PyramidError) -> Self {
        Self::LevelFailed {
            source_name: source_name.into(),
            level,
            cause: Box::new(cause),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The innermost error, past any [`PyramidError::LevelFailed`] wrappers.
    pub fn root_cause(&self) -> &PyramidError {
        match self {
            Self::LevelFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type for pyramid operations.
pub type Result<T> = std::result::Result<T, PyramidError>;
