//! Error types for shared flood types.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while constructing shared value types.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid raster grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid geotransform: {0}")]
    InvalidTransform(String),

    #[error("Invalid event key '{input}': {reason}")]
    InvalidEventKey { input: String, reason: String },

    #[error(transparent)]
    Crs(#[from] crate::crs::CrsParseError),
}
