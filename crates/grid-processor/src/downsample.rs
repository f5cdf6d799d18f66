//! Block aggregation for reducing raster resolution by an integer factor.
//!
//! Every `factor` x `factor` block of source cells becomes one output cell.
//! Trailing rows and columns that do not fill a whole block are trimmed, so
//! the output origin matches the source origin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;

/// Method used to aggregate a block of cells.
///
/// Missing samples (NaN or the tile's sentinel) never contribute; a block
/// with no valid sample becomes NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    /// Average of the valid samples in the block.
    #[default]
    Mean,
    /// Maximum of the valid samples - preserves peak depths.
    Max,
    /// Top-left sample of the block.
    Nearest,
}

impl DownsampleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Nearest => "nearest",
        }
    }
}

impl FromStr for DownsampleMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "average" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "nearest" => Ok(Self::Nearest),
            other => Err(format!("unknown downsample method '{}'", other)),
        }
    }
}

impl fmt::Display for DownsampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer factor that brings `max_dimension_of_input` within `budget`:
/// `ceil(max_dimension_of_input / budget)`, never below 1.
pub fn downsample_factor(max_dimension_of_input: usize, budget: usize) -> usize {
    if budget == 0 {
        return 1;
    }
    max_dimension_of_input.div_ceil(budget).max(1)
}

/// Aggregate `tile` by `factor` in both directions.
///
/// A factor of 0 or 1 returns the tile unchanged. The output carries no
/// sentinel: missing blocks are NaN.
///
/// # Errors
/// Returns `EmptyExtent` when the factor exceeds a dimension of the tile.
pub fn coarsen(tile: &RasterTile, factor: usize, method: DownsampleMethod) -> Result<RasterTile> {
    if factor <= 1 {
        return Ok(tile.clone());
    }

    let src_grid = tile.grid();
    let out_grid = src_grid.downsampled(factor).ok_or_else(|| {
        GridProcessorError::empty_extent(format!(
            "{}x{} raster collapses when downsampled by {}",
            src_grid.width, src_grid.height, factor
        ))
    })?;

    let src_width = src_grid.width;
    let data = tile.data();
    let mut output = Vec::with_capacity(out_grid.len());
    let mut block = Vec::with_capacity(factor * factor);

    for out_row in 0..out_grid.height {
        for out_col in 0..out_grid.width {
            let row0 = out_row * factor;
            let col0 = out_col * factor;

            block.clear();
            for row in row0..row0 + factor {
                let start = row * src_width + col0;
                block.extend(
                    data[start..start + factor]
                        .iter()
                        .copied()
                        .filter(|v| !tile.is_missing(*v)),
                );
            }

            let value = match method {
                DownsampleMethod::Mean => mean_of_block(&block),
                DownsampleMethod::Max => max_of_block(&block),
                DownsampleMethod::Nearest => {
                    let v = data[row0 * src_width + col0];
                    if tile.is_missing(v) {
                        f32::NAN
                    } else {
                        v
                    }
                }
            };
            output.push(value);
        }
    }

    RasterTile::new(out_grid, output, None)
}

/// Mean of the valid values, NaN when there are none.
#[inline]
fn mean_of_block(values: &[f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let sum: f64 = values.iter().map(|v| *v as f64).sum();
    (sum / values.len() as f64) as f32
}

/// Maximum of the valid values, NaN when there are none.
#[inline]
fn max_of_block(values: &[f32]) -> f32 {
    // f32::max returns the other operand when one is NaN
    values.iter().copied().fold(f32::NAN, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_common::{Crs, GeoTransform, RasterGrid};

    fn tile(width: usize, height: usize, data: Vec<f32>, nodata: Option<f32>) -> RasterTile {
        let grid = RasterGrid::new(
            Some(Crs::EQUI7_EUROPE),
            GeoTransform::new(1000.0, 2000.0, 10.0, 10.0),
            width,
            height,
        )
        .unwrap();
        RasterTile::new(grid, data, nodata).unwrap()
    }

    #[test]
    fn test_factor() {
        assert_eq!(downsample_factor(2000, 2000), 1);
        assert_eq!(downsample_factor(2001, 2000), 2);
        assert_eq!(downsample_factor(10_000, 2000), 5);
        assert_eq!(downsample_factor(10, 2000), 1);
        assert_eq!(downsample_factor(10, 0), 1);
    }

    #[test]
    fn test_coarsen_mean() {
        #[rustfmt::skip]
        let t = tile(4, 2, vec![
            1.0, 3.0, 5.0, 7.0,
            1.0, 3.0, 5.0, 7.0,
        ], None);

        let out = coarsen(&t, 2, DownsampleMethod::Mean).unwrap();
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.data(), &[2.0, 6.0]);
        assert_eq!(out.grid().resolution(), (20.0, 20.0));
        assert_eq!(out.grid().transform.origin_x, 1000.0);
    }

    #[test]
    fn test_coarsen_ignores_missing_and_sentinel() {
        #[rustfmt::skip]
        let t = tile(4, 2, vec![
            2.0, f32::NAN, -9999.0, -9999.0,
            -9999.0, 4.0, f32::NAN, -9999.0,
        ], Some(-9999.0));

        let mean = coarsen(&t, 2, DownsampleMethod::Mean).unwrap();
        assert_eq!(mean.data()[0], 3.0);
        assert!(mean.data()[1].is_nan());
        assert_eq!(mean.nodata(), None);

        let max = coarsen(&t, 2, DownsampleMethod::Max).unwrap();
        assert_eq!(max.data()[0], 4.0);
        assert!(max.data()[1].is_nan());
    }

    #[test]
    fn test_coarsen_trims_partial_blocks() {
        let t = tile(5, 3, (0..15).map(|v| v as f32).collect(), None);
        let out = coarsen(&t, 2, DownsampleMethod::Nearest).unwrap();
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.data(), &[0.0, 2.0]);
    }

    #[test]
    fn test_coarsen_identity_and_collapse() {
        let t = tile(3, 3, vec![1.0; 9], None);
        assert_eq!(coarsen(&t, 1, DownsampleMethod::Mean).unwrap(), t);

        let err = coarsen(&t, 4, DownsampleMethod::Mean).unwrap_err();
        assert!(matches!(err, GridProcessorError::EmptyExtent(_)));
    }
}
