//! Bringing rasters of differing resolution, extent and reference onto one grid.
//!
//! Two layouts are supported:
//!
//! - **Base alignment** ([`GridAligner::align_to_base`]): the first raster's
//!   grid, downsampled to fit the dimension budget, is the target for all.
//! - **Union alignment** ([`GridAligner::union_grid`] +
//!   [`GridAligner::align_to_grid`]): a grid covering the union of all extents
//!   in a target CRS; rasters are warped onto it one at a time.

use flood_common::{BoundingBox, Crs, RasterGrid};
use projection::{transform_bounds, CoordTransformer};
use serde::{Deserialize, Serialize};

use crate::downsample::{coarsen, downsample_factor, DownsampleMethod};
use crate::error::{GridProcessorError, Result};
use crate::projection::warp;
use crate::types::{RasterTile, ResampleMethod};

/// Alignment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Largest allowed width or height of the aligned grid.
    pub max_dimension: usize,
    /// Reference assumed for rasters that carry none.
    pub default_crs: Option<Crs>,
    /// Kernel used when warping onto the aligned grid.
    pub resampling: ResampleMethod,
    /// Aggregation used when reducing resolution.
    pub downsample: DownsampleMethod,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            default_crs: Some(Crs::EQUI7_EUROPE),
            resampling: ResampleMethod::Nearest,
            downsample: DownsampleMethod::Mean,
        }
    }
}

/// Rasters sharing one grid.
#[derive(Debug, Clone)]
pub struct AlignedSet {
    pub grid: RasterGrid,
    pub tiles: Vec<RasterTile>,
    /// Downsample factor applied before warping (1 = none).
    pub factor: usize,
    /// Input positions that were assigned the default reference.
    pub defaulted: Vec<usize>,
}

/// Aligns rasters onto a shared pixel grid.
#[derive(Debug, Clone)]
pub struct GridAligner {
    config: AlignConfig,
}

impl GridAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Tag an unreferenced raster with the default CRS.
    ///
    /// Returns the tile and whether the default was applied.
    ///
    /// # Errors
    /// `MissingReference { index }` when the raster has no CRS and no default
    /// is configured.
    pub fn resolve_reference(&self, index: usize, tile: RasterTile) -> Result<(RasterTile, bool)> {
        if tile.grid().crs.is_some() {
            return Ok((tile, false));
        }
        let crs = self
            .config
            .default_crs
            .ok_or(GridProcessorError::MissingReference { index })?;
        Ok((tile.with_crs(crs), true))
    }

    fn grid_crs(&self, index: usize, grid: &RasterGrid) -> Result<Crs> {
        grid.crs
            .or(self.config.default_crs)
            .ok_or(GridProcessorError::MissingReference { index })
    }

    /// Align every raster onto the first one's (possibly downsampled) grid.
    ///
    /// Every input is block-aggregated by the same factor before warping, so
    /// nothing is reprojected at full native resolution.
    ///
    /// # Errors
    /// - `EmptyExtent` for no input, a base without area, or a base that
    ///   collapses under the downsample factor
    /// - `MissingReference` for an unreferenced input without a default
    /// - projection errors when an input CRS has no known definition
    pub fn align_to_base(&self, tiles: Vec<RasterTile>) -> Result<AlignedSet> {
        if tiles.is_empty() {
            return Err(GridProcessorError::empty_extent("no rasters to align"));
        }

        let mut defaulted = Vec::new();
        let mut resolved = Vec::with_capacity(tiles.len());
        for (index, tile) in tiles.into_iter().enumerate() {
            let (tile, assigned) = self.resolve_reference(index, tile)?;
            if assigned {
                defaulted.push(index);
            }
            resolved.push(tile);
        }

        let base = &resolved[0];
        if !base.bounds().has_area() {
            return Err(GridProcessorError::empty_extent("base raster has no area"));
        }

        let factor = downsample_factor(base.grid().max_dimension(), self.config.max_dimension);
        let base = coarsen(base, factor, self.config.downsample)?;
        let grid = base.grid().clone();

        tracing::debug!(
            inputs = resolved.len(),
            factor,
            width = grid.width,
            height = grid.height,
            "Aligning rasters to base grid"
        );

        let mut aligned = Vec::with_capacity(resolved.len());
        aligned.push(base);

        for (index, tile) in resolved.iter().enumerate().skip(1) {
            let reduced = if factor > 1 && tile.grid().downsampled(factor).is_some() {
                coarsen(tile, factor, self.config.downsample)?
            } else {
                if factor > 1 {
                    tracing::debug!(
                        index,
                        factor,
                        width = tile.width(),
                        height = tile.height(),
                        "Raster smaller than downsample block, warping at native resolution"
                    );
                }
                tile.clone()
            };
            aligned.push(warp(&reduced, &grid, self.config.resampling)?);
        }

        Ok(AlignedSet {
            grid,
            tiles: aligned,
            factor,
            defaulted,
        })
    }

    /// Grid in `target_crs` covering the union of `grids`.
    ///
    /// Resolution comes from the first grid (converted into `target_crs`
    /// when needed); dimensions are capped by the configured maximum and the
    /// pixel size is then recomputed so the grid spans the union exactly.
    pub fn union_grid(&self, grids: &[RasterGrid], target_crs: Crs) -> Result<RasterGrid> {
        let mut union: Option<BoundingBox> = None;
        let mut resolution = None;

        for (index, grid) in grids.iter().enumerate() {
            let crs = self.grid_crs(index, grid)?;
            let bounds = if crs == target_crs {
                grid.bounds()
            } else {
                let transformer = CoordTransformer::new(crs, target_crs)?;
                transform_bounds(&transformer, &grid.bounds())?
            };

            if resolution.is_none() {
                resolution = Some(if crs == target_crs {
                    grid.resolution()
                } else {
                    (
                        bounds.width() / grid.width as f64,
                        bounds.height() / grid.height as f64,
                    )
                });
            }

            union = Some(match union {
                Some(u) => u.union(&bounds),
                None => bounds,
            });
        }

        let (union, (res_x, res_y)) = match (union, resolution) {
            (Some(u), Some(r)) => (u, r),
            _ => return Err(GridProcessorError::empty_extent("no rasters to compose")),
        };

        if !union.has_area() || res_x <= 0.0 || res_y <= 0.0 {
            return Err(GridProcessorError::empty_extent(format!(
                "union extent {:?} has no area",
                union
            )));
        }

        let mut width = cells_to_cover(union.width(), res_x);
        let mut height = cells_to_cover(union.height(), res_y);

        let factor = downsample_factor(width.max(height), self.config.max_dimension);
        if factor > 1 {
            width = width.div_ceil(factor);
            height = height.div_ceil(factor);
        }

        tracing::debug!(
            min_x = union.min_x,
            min_y = union.min_y,
            max_x = union.max_x,
            max_y = union.max_y,
            width,
            height,
            factor,
            "Built union grid"
        );

        Ok(RasterGrid::from_bounds(Some(target_crs), &union, width, height)?)
    }

    /// Warp one raster onto `grid`, assigning the default reference if needed.
    pub fn align_to_grid(&self, index: usize, tile: RasterTile, grid: &RasterGrid) -> Result<RasterTile> {
        let (tile, _) = self.resolve_reference(index, tile)?;
        warp(&tile, grid, self.config.resampling)
    }
}

/// Whole cells of size `resolution` needed to span `extent`, at least one.
fn cells_to_cover(extent: f64, resolution: f64) -> usize {
    // Tolerate rounding noise so an exact multiple does not gain a cell
    let cells = (extent / resolution - 1e-9).ceil();
    cells.max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_common::GeoTransform;

    fn grid(crs: Option<Crs>, origin: (f64, f64), res: f64, width: usize, height: usize) -> RasterGrid {
        RasterGrid::new(crs, GeoTransform::new(origin.0, origin.1, res, res), width, height).unwrap()
    }

    fn tile(g: RasterGrid, value: f32) -> RasterTile {
        let len = g.len();
        RasterTile::new(g, vec![value; len], None).unwrap()
    }

    fn aligner(max_dimension: usize, default_crs: Option<Crs>) -> GridAligner {
        GridAligner::new(AlignConfig {
            max_dimension,
            default_crs,
            ..AlignConfig::default()
        })
    }

    #[test]
    fn test_cells_to_cover() {
        assert_eq!(cells_to_cover(10.0, 1.0), 10);
        assert_eq!(cells_to_cover(10.5, 1.0), 11);
        assert_eq!(cells_to_cover(0.3 * 3.0, 0.3), 3);
        assert_eq!(cells_to_cover(0.0, 1.0), 1);
    }

    #[test]
    fn test_align_shares_base_grid() {
        let base = tile(grid(Some(Crs::WGS84), (0.0, 10.0), 1.0, 10, 10), 1.0);
        let finer = tile(grid(Some(Crs::WGS84), (2.0, 8.0), 0.5, 8, 8), 2.0);

        let set = aligner(2000, None).align_to_base(vec![base.clone(), finer]).unwrap();
        assert_eq!(set.factor, 1);
        assert_eq!(&set.grid, base.grid());
        assert!(set.tiles.iter().all(|t| t.grid() == &set.grid));

        // finer raster covers x in [2, 6), y in (4, 8]
        let second = &set.tiles[1];
        assert_eq!(second.get(3, 3), Some(2.0));
        assert!(second.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_align_honors_dimension_budget() {
        let base = tile(grid(Some(Crs::WGS84), (0.0, 50.0), 0.01, 5000, 3000), 1.0);
        let other = tile(grid(Some(Crs::WGS84), (1.0, 49.0), 0.02, 1000, 1000), 2.0);

        let set = aligner(2000, None).align_to_base(vec![base, other]).unwrap();
        assert_eq!(set.factor, 3);
        assert!(set.grid.max_dimension() <= 2000);
        assert_eq!((set.grid.width, set.grid.height), (1666, 1000));
        assert!(set.tiles.iter().all(|t| t.grid() == &set.grid));
    }

    #[test]
    fn test_align_assigns_default_reference() {
        let base = tile(grid(None, (0.0, 4.0), 1.0, 4, 4), 1.0);
        let tagged = tile(grid(Some(Crs::EQUI7_EUROPE), (0.0, 4.0), 1.0, 4, 4), 2.0);

        let set = aligner(2000, Some(Crs::EQUI7_EUROPE))
            .align_to_base(vec![base, tagged])
            .unwrap();
        assert_eq!(set.grid.crs, Some(Crs::EQUI7_EUROPE));
        assert_eq!(set.defaulted, vec![0]);
        assert_eq!(set.tiles[1].data(), &[2.0; 16]);
    }

    #[test]
    fn test_align_missing_reference_reports_index() {
        let tagged = tile(grid(Some(Crs::WGS84), (0.0, 4.0), 1.0, 4, 4), 1.0);
        let untagged = tile(grid(None, (0.0, 4.0), 1.0, 4, 4), 2.0);

        let err = aligner(2000, None).align_to_base(vec![tagged, untagged]).unwrap_err();
        assert!(matches!(err, GridProcessorError::MissingReference { index: 1 }));
    }

    #[test]
    fn test_align_empty_and_collapsing_base() {
        let a = aligner(2000, None);
        assert!(matches!(
            a.align_to_base(Vec::new()),
            Err(GridProcessorError::EmptyExtent(_))
        ));

        // 10000 x 3 needs factor 5, which collapses the height
        let strip = tile(grid(Some(Crs::WGS84), (0.0, 1.0), 0.001, 10_000, 3), 1.0);
        assert!(matches!(
            a.align_to_base(vec![strip]),
            Err(GridProcessorError::EmptyExtent(_))
        ));
    }

    #[test]
    fn test_union_grid_covers_disjoint_extents() {
        let west = grid(Some(Crs::WGS84), (0.0, 10.0), 0.5, 4, 4);
        let east = grid(Some(Crs::WGS84), (8.0, 6.0), 0.5, 4, 4);

        let union = aligner(2000, None).union_grid(&[west, east], Crs::WGS84).unwrap();
        assert_eq!(union.bounds(), BoundingBox::new(0.0, 4.0, 10.0, 10.0));
        assert_eq!((union.width, union.height), (20, 12));
        assert_eq!(union.resolution(), (0.5, 0.5));
    }

    #[test]
    fn test_union_grid_is_capped() {
        let a = grid(Some(Crs::WGS84), (0.0, 10.0), 0.001, 1000, 1000);
        let b = grid(Some(Crs::WGS84), (9.0, 1.0), 0.001, 1000, 1000);

        // Uncapped: 10000 x 10000 cells
        let union = aligner(2000, None).union_grid(&[a, b], Crs::WGS84).unwrap();
        assert_eq!((union.width, union.height), (2000, 2000));
        assert_eq!(union.bounds(), BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_union_grid_rejects_empty_input() {
        assert!(matches!(
            aligner(2000, None).union_grid(&[], Crs::WGS84),
            Err(GridProcessorError::EmptyExtent(_))
        ));
    }

    #[test]
    fn test_align_to_grid_pads_outside_extent() {
        let target = grid(Some(Crs::WGS84), (0.0, 2.0), 1.0, 4, 2);
        let src = tile(grid(Some(Crs::WGS84), (2.0, 2.0), 1.0, 2, 2), 3.0);

        let out = aligner(2000, None).align_to_grid(0, src, &target).unwrap();
        assert!(out.data()[0].is_nan() && out.data()[1].is_nan());
        assert_eq!(&out.data()[2..4], &[3.0, 3.0]);
    }
}
