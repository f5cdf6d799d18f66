//! Resampling rasters onto other grids.
//!
//! `interpolation` holds the per-sample kernels; `reproject` drives them over
//! whole grids, transforming coordinates between references when needed.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{bilinear_interpolate, interpolate, nearest_interpolate};
pub use reproject::{reproject_to_crs, suggested_grid, warp};
