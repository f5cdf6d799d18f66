//! Error types for grid processing.

use flood_common::CommonError;
use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Input `index` of an alignment has no coordinate reference and no
    /// default is configured.
    #[error("raster #{index} has no coordinate reference and no default is configured")]
    MissingReference { index: usize },

    /// A grid operation needs a coordinate reference the grid does not carry.
    #[error("grid has no coordinate reference")]
    UnreferencedGrid,

    /// A grid collapsed to zero area.
    #[error("empty extent: {0}")]
    EmptyExtent(String),

    /// Two rasters that must share a grid do not.
    #[error("grid mismatch: expected {expected}, got {actual}")]
    GridMismatch { expected: String, actual: String },

    /// Sample buffer length disagrees with the grid.
    #[error("data length {actual} does not match grid of {expected} cells")]
    DataLength { expected: usize, actual: usize },

    /// Failed to open the raster source.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read data from the raster.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// Failed to persist a raster.
    #[error("failed to write raster: {0}")]
    WriteFailed(String),

    /// Invalid or missing metadata in the raster file.
    #[error("invalid raster metadata: {0}")]
    InvalidMetadata(String),

    /// File extension not handled by any reader.
    #[error("unsupported raster format: {0}")]
    UnsupportedFormat(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl GridProcessorError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a WriteFailed error.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create an EmptyExtent error.
    pub fn empty_extent(msg: impl Into<String>) -> Self {
        Self::EmptyExtent(msg.into())
    }

    /// True for failures reading or writing bytes (as opposed to geometry problems).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed(_)
                | Self::ReadFailed(_)
                | Self::WriteFailed(_)
                | Self::InvalidMetadata(_)
                | Self::UnsupportedFormat(_)
                | Self::StorageError(_)
        )
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
