//! Error types for the flood pipeline.

use std::fmt;
use std::path::PathBuf;

use flood_common::CommonError;
use grid_processor::GridProcessorError;
use projection::ProjectionError;
use thiserror::Error;
use tile_downloader::DownloadError;

use crate::extract::PatternMismatch;

/// Errors that can occur while building event mosaics or the composite.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    PatternMismatch(#[from] PatternMismatch),

    #[error(transparent)]
    Grid(#[from] GridProcessorError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Category of this failure, for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PatternMismatch(_) => ErrorKind::PatternMismatch,
            Self::Grid(e) => grid_kind(e),
            Self::Projection(_) => ErrorKind::Projection,
            // Degenerate grids and transforms
            Self::Common(_) => ErrorKind::EmptyExtent,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Download(DownloadError::Config(_)) => ErrorKind::Config,
            Self::Download(_) => ErrorKind::IoFailure,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

fn grid_kind(err: &GridProcessorError) -> ErrorKind {
    match err {
        GridProcessorError::MissingReference { .. } | GridProcessorError::UnreferencedGrid => {
            ErrorKind::MissingReference
        }
        GridProcessorError::EmptyExtent(_)
        | GridProcessorError::GridMismatch { .. }
        | GridProcessorError::Common(_) => ErrorKind::EmptyExtent,
        GridProcessorError::Projection(_) => ErrorKind::Projection,
        GridProcessorError::ConfigError(_) => ErrorKind::Config,
        GridProcessorError::DataLength { .. }
        | GridProcessorError::OpenFailed(_)
        | GridProcessorError::ReadFailed(_)
        | GridProcessorError::WriteFailed(_)
        | GridProcessorError::InvalidMetadata(_)
        | GridProcessorError::UnsupportedFormat(_)
        | GridProcessorError::StorageError(_) => ErrorKind::IoFailure,
    }
}

/// Failure categories reported in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Tile name does not encode an event.
    PatternMismatch,
    /// Raster without a coordinate reference and no default configured.
    MissingReference,
    /// Grid collapsed to zero area.
    EmptyExtent,
    /// Raster could not be read or written.
    IoFailure,
    /// Coordinate reference has no known definition or failed to transform.
    Projection,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternMismatch => "pattern_mismatch",
            Self::MissingReference => "missing_reference",
            Self::EmptyExtent => "empty_extent",
            Self::IoFailure => "io_failure",
            Self::Projection => "projection",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
