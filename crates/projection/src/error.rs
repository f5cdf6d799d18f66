//! Error types for coordinate transformations.

use flood_common::Crs;
use thiserror::Error;

/// Errors raised while building or applying a coordinate transform.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No projection definition is known for the EPSG code.
    #[error("no projection definition for {0}")]
    UnsupportedCrs(Crs),

    /// The projection definition was rejected by proj4rs.
    #[error("invalid projection definition for {crs}: {message}")]
    InvalidDefinition { crs: Crs, message: String },

    /// A point could not be transformed.
    #[error("transform {from} -> {to} failed at ({x}, {y}): {message}")]
    TransformFailed {
        from: Crs,
        to: Crs,
        x: f64,
        y: f64,
        message: String,
    },

    /// Bounds transformation produced no finite point.
    #[error("bounds could not be transformed from {from} to {to}")]
    DegenerateBounds { from: Crs, to: Crs },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
