//! Error types for the ingestion crate.

use raster_common::RasterError;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to decode TIFF: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Failed to read source raster: {0}")]
    SourceRead(String),

    #[error("Unsupported source layout: {0}")]
    UnsupportedLayout(String),

    #[error("Missing georeferencing: {0}")]
    MissingGeoreference(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestionError {
    pub fn source_read(msg: impl Into<String>) -> Self {
        Self::SourceRead(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayout(msg.into())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
