//! Coordinate reference system transformations.
//!
//! Wraps the pure-Rust `proj4rs` port of PROJ.4 behind EPSG-coded
//! [`Crs`](flood_common::Crs) values, with an identity fast path when source
//! and target agree.

pub mod epsg;
pub mod error;
pub mod transform;

pub use epsg::proj_definition;
pub use error::{ProjectionError, Result};
pub use transform::{transform_bounds, CoordTransformer, EDGE_SAMPLES};
