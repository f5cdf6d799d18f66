//! Pixel-wise maximum over aligned rasters with NaN as the identity element.

use flood_common::RasterGrid;

use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;

/// Maximum of two depths where a missing operand is ignored.
///
/// Commutative and associative; NaN only when both are NaN.
#[inline]
pub fn nan_max(a: f32, b: f32) -> f32 {
    // f32::max returns the other operand when one is NaN
    a.max(b)
}

/// Running pixel-wise maximum over rasters that share one grid.
///
/// Rasters are folded in one at a time, so callers never need to hold more
/// than the accumulator and the raster being folded.
#[derive(Debug, Clone)]
pub struct MaxAccumulator {
    grid: RasterGrid,
    data: Vec<f32>,
    folded: usize,
}

impl MaxAccumulator {
    /// Start with every cell missing.
    pub fn new(grid: RasterGrid) -> Self {
        let data = vec![f32::NAN; grid.len()];
        Self {
            grid,
            data,
            folded: 0,
        }
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    /// Number of rasters folded so far.
    pub fn folded(&self) -> usize {
        self.folded
    }

    /// Fold one raster into the running maximum.
    ///
    /// The tile's sentinel, if any, is treated as missing.
    ///
    /// # Errors
    /// Returns `GridMismatch` when the tile is not on the accumulator's grid.
    pub fn fold(&mut self, tile: &RasterTile) -> Result<()> {
        if tile.grid() != &self.grid {
            return Err(GridProcessorError::GridMismatch {
                expected: describe(&self.grid),
                actual: describe(tile.grid()),
            });
        }

        for (acc, &value) in self.data.iter_mut().zip(tile.data()) {
            if !tile.is_missing(value) {
                *acc = nan_max(*acc, value);
            }
        }
        self.folded += 1;
        Ok(())
    }

    /// The accumulated raster. It carries no sentinel.
    pub fn finish(self) -> RasterTile {
        RasterTile::from_grid_data(self.grid, self.data)
    }
}

fn describe(grid: &RasterGrid) -> String {
    let t = &grid.transform;
    format!(
        "{}x{} @ ({}, {}) res ({}, {}) {}",
        grid.width,
        grid.height,
        t.origin_x,
        t.origin_y,
        t.pixel_width,
        t.pixel_height,
        grid.crs.map(|c| c.to_string()).unwrap_or_else(|| "no CRS".to_string())
    )
}

/// Pixel-wise maximum of `tiles`, which must share one grid.
///
/// # Errors
/// Returns `EmptyExtent` for an empty slice and `GridMismatch` when the
/// tiles do not share a grid.
pub fn merge_max(tiles: &[RasterTile]) -> Result<RasterTile> {
    let first = tiles
        .first()
        .ok_or_else(|| GridProcessorError::empty_extent("no rasters to merge"))?;

    let mut acc = MaxAccumulator::new(first.grid().clone());
    for tile in tiles {
        acc.fold(tile)?;
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::clean;
    use flood_common::{Crs, GeoTransform};
    use test_utils::assert_depths_eq;

    fn grid(width: usize) -> RasterGrid {
        RasterGrid::new(
            Some(Crs::WGS84),
            GeoTransform::new(10.0, 45.0, 0.01, 0.01),
            width,
            1,
        )
        .unwrap()
    }

    fn tile(data: Vec<f32>) -> RasterTile {
        RasterTile::new(grid(data.len()), data, None).unwrap()
    }

    #[test]
    fn test_nan_max_identity() {
        assert_eq!(nan_max(f32::NAN, 2.0), 2.0);
        assert_eq!(nan_max(2.0, f32::NAN), 2.0);
        assert_eq!(nan_max(1.0, 3.0), 3.0);
        assert!(nan_max(f32::NAN, f32::NAN).is_nan());
    }

    #[test]
    fn test_clean_then_merge_scenario() {
        let a = clean(&tile(vec![1.0, -0.5, f32::NAN]));
        let b = clean(&tile(vec![0.3, 2.0, 5.0]));
        let merged = merge_max(&[a, b]).unwrap();
        assert_eq!(merged.data(), &[1.0, 2.0, 5.0]);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let inputs = [
            vec![1.0, f32::NAN, 3.0, f32::NAN],
            vec![f32::NAN, f32::NAN, 4.0, 0.5],
            vec![2.0, f32::NAN, 1.0, f32::NAN],
        ];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let reference = merge_max(&inputs.iter().cloned().map(tile).collect::<Vec<_>>()).unwrap();
        assert_depths_eq!(reference.data(), &[2.0, f32::NAN, 4.0, 0.5]);

        for order in permutations {
            let tiles: Vec<RasterTile> = order.iter().map(|&i| tile(inputs[i].clone())).collect();
            let merged = merge_max(&tiles).unwrap();
            assert_depths_eq!(merged.data(), reference.data());
        }
    }

    #[test]
    fn test_merge_grouping_does_not_matter() {
        let a = tile(vec![1.0, f32::NAN, 6.0]);
        let b = tile(vec![4.0, 2.0, f32::NAN]);
        let c = tile(vec![f32::NAN, 3.0, 5.0]);

        let left = merge_max(&[merge_max(&[a.clone(), b.clone()]).unwrap(), c.clone()]).unwrap();
        let right = merge_max(&[a, merge_max(&[b, c]).unwrap()]).unwrap();
        assert_depths_eq!(left.data(), right.data());
    }

    #[test]
    fn test_all_missing_fold_is_identity() {
        let mut acc = MaxAccumulator::new(grid(3));
        acc.fold(&tile(vec![1.0, f32::NAN, 2.0])).unwrap();
        let before = acc.clone().finish();

        acc.fold(&RasterTile::missing(grid(3))).unwrap();
        assert_eq!(acc.folded(), 2);
        assert_depths_eq!(acc.finish().data(), before.data());
    }

    #[test]
    fn test_fold_ignores_sentinel() {
        let mut acc = MaxAccumulator::new(grid(2));
        let t = RasterTile::new(grid(2), vec![-9999.0, 1.0], Some(-9999.0)).unwrap();
        acc.fold(&t).unwrap();
        assert_depths_eq!(acc.finish().data(), &[f32::NAN, 1.0]);
    }

    #[test]
    fn test_fold_rejects_other_grid() {
        let mut acc = MaxAccumulator::new(grid(3));
        let err = acc.fold(&tile(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, GridProcessorError::GridMismatch { .. }));
        assert_eq!(acc.folded(), 0);
    }

    #[test]
    fn test_merge_empty_fails() {
        assert!(matches!(
            merge_max(&[]),
            Err(GridProcessorError::EmptyExtent(_))
        ));
    }
}
