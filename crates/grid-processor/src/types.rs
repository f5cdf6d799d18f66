//! Core types for grid processing.

use std::fmt;
use std::str::FromStr;

use flood_common::{BoundingBox, Crs, RasterGrid};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// A single-band depth raster: samples bound to a grid and an optional
/// on-disk "no data" sentinel.
///
/// Samples are row-major, top row first. The in-memory missing-value marker
/// is NaN; `nodata` is the raw sentinel the source declared, if any. Stages
/// never mutate a tile they receive; each returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    grid: RasterGrid,
    data: Vec<f32>,
    nodata: Option<f32>,
}

impl RasterTile {
    /// Create a tile, checking the sample count against the grid.
    pub fn new(grid: RasterGrid, data: Vec<f32>, nodata: Option<f32>) -> Result<Self> {
        if data.len() != grid.len() {
            return Err(GridProcessorError::DataLength {
                expected: grid.len(),
                actual: data.len(),
            });
        }
        Ok(Self { grid, data, nodata })
    }

    /// Tile from a buffer already known to match `grid`, without a sentinel.
    pub(crate) fn from_grid_data(grid: RasterGrid, data: Vec<f32>) -> Self {
        debug_assert_eq!(grid.len(), data.len());
        Self {
            grid,
            data,
            nodata: None,
        }
    }

    /// A tile whose every sample is missing.
    pub fn missing(grid: RasterGrid) -> Self {
        let data = vec![f32::NAN; grid.len()];
        Self {
            grid,
            data,
            nodata: None,
        }
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn bounds(&self) -> BoundingBox {
        self.grid.bounds()
    }

    /// Sample at (col, row); `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        self.data.get(row * self.grid.width + col).copied()
    }

    /// True when `value` is NaN or equals the declared sentinel.
    #[inline]
    pub fn is_missing(&self, value: f32) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    /// Count of samples that are neither NaN nor the sentinel.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_missing(**v)).count()
    }

    /// Samples with the sentinel replaced by NaN.
    pub fn normalized_data(&self) -> Vec<f32> {
        match self.nodata {
            Some(sentinel) => self
                .data
                .iter()
                .map(|&v| if v == sentinel { f32::NAN } else { v })
                .collect(),
            None => self.data.clone(),
        }
    }

    /// New tile on the same grid with every sample passed through `f`.
    /// The result carries no sentinel.
    pub fn map_samples(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            grid: self.grid.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
            nodata: None,
        }
    }

    /// Same samples, grid tagged with `crs`.
    pub fn with_crs(self, crs: Crs) -> Self {
        Self {
            grid: self.grid.with_crs(crs),
            ..self
        }
    }
}

/// Resampling kernel used when moving samples onto another grid.
///
/// One method applies to every input of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    /// Value of the source cell containing the target cell center.
    #[default]
    Nearest,
    /// Weighted average of the four surrounding source cell centers.
    Bilinear,
}

impl ResampleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl FromStr for ResampleMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            other => Err(format!("unknown resampling method '{}'", other)),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_common::GeoTransform;

    fn grid(width: usize, height: usize) -> RasterGrid {
        RasterGrid::new(
            Some(Crs::WGS84),
            GeoTransform::new(0.0, 1.0, 0.1, 0.1),
            width,
            height,
        )
        .unwrap()
    }

    #[test]
    fn test_tile_length_checked() {
        assert!(RasterTile::new(grid(2, 2), vec![0.0; 4], None).is_ok());
        let err = RasterTile::new(grid(2, 2), vec![0.0; 3], None).unwrap_err();
        assert!(matches!(
            err,
            GridProcessorError::DataLength {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_missing_and_sentinel() {
        let tile = RasterTile::new(grid(2, 2), vec![1.0, -9999.0, f32::NAN, 0.0], Some(-9999.0))
            .unwrap();
        assert_eq!(tile.valid_count(), 2);
        assert_eq!(tile.get(1, 1), Some(0.0));
        assert_eq!(tile.get(2, 0), None);

        let normalized = tile.normalized_data();
        assert!(normalized[1].is_nan());
        assert_eq!(normalized[3], 0.0);

        assert!(RasterTile::missing(grid(3, 1)).data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_resample_method_parse() {
        assert_eq!("nearest".parse::<ResampleMethod>().unwrap(), ResampleMethod::Nearest);
        assert_eq!("Bilinear".parse::<ResampleMethod>().unwrap(), ResampleMethod::Bilinear);
        assert!("cubic".parse::<ResampleMethod>().is_err());
        assert_eq!(ResampleMethod::default().to_string(), "nearest");
    }
}
