//! Warping rasters onto other grids, across coordinate references if needed.
//!
//! Warping is an inverse mapping: each target cell center is transformed into
//! the source CRS, located in the source pixel space and sampled there. Target
//! cells that fall outside the source extent are NaN.

use flood_common::{Crs, GeoTransform, RasterGrid};
use projection::{transform_bounds, CoordTransformer};

use super::interpolation::interpolate;
use crate::error::{GridProcessorError, Result};
use crate::types::{RasterTile, ResampleMethod};

/// Resample `tile` onto `target`.
///
/// Source and target must both carry a CRS, or both carry none (in which
/// case their coordinates are taken to be in the same space). The result has
/// no sentinel; sentinel and out-of-extent cells are NaN.
pub fn warp(tile: &RasterTile, target: &RasterGrid, method: ResampleMethod) -> Result<RasterTile> {
    let source = tile.grid();
    let src_data = tile.normalized_data();

    if source == target {
        return RasterTile::new(target.clone(), src_data, None);
    }

    let transformer = match (target.crs, source.crs) {
        (Some(to), Some(from)) if to != from => Some(CoordTransformer::new(to, from)?),
        (Some(_), Some(_)) | (None, None) => None,
        _ => return Err(GridProcessorError::UnreferencedGrid),
    };

    let (src_width, src_height) = (source.width, source.height);
    let mut output = Vec::with_capacity(target.len());

    for row in 0..target.height {
        for col in 0..target.width {
            let (x, y) = target.cell_center(col, row);

            let world = match &transformer {
                Some(t) => match t.transform(x, y) {
                    Ok(p) => p,
                    Err(_) => {
                        output.push(f32::NAN);
                        continue;
                    }
                },
                None => (x, y),
            };

            let (px, py) = source.transform.world_to_pixel(world.0, world.1);
            output.push(interpolate(method, &src_data, src_width, src_height, px, py));
        }
    }

    RasterTile::new(target.clone(), output, None)
}

/// Grid in `target_crs` covering `source`, sized so the diagonal keeps the
/// source's pixel count. Pixels are square.
pub fn suggested_grid(source: &RasterGrid, target_crs: Crs) -> Result<RasterGrid> {
    let from = source.crs.ok_or(GridProcessorError::UnreferencedGrid)?;
    let transformer = CoordTransformer::new(from, target_crs)?;
    let bounds = transform_bounds(&transformer, &source.bounds())?;

    if !bounds.has_area() {
        return Err(GridProcessorError::empty_extent(format!(
            "bounds in {} have no area",
            target_crs
        )));
    }

    let src_diagonal = (source.width as f64).hypot(source.height as f64);
    let dst_diagonal = bounds.width().hypot(bounds.height());
    let resolution = dst_diagonal / src_diagonal;

    let width = (bounds.width() / resolution).ceil().max(1.0) as usize;
    let height = (bounds.height() / resolution).ceil().max(1.0) as usize;

    let grid = RasterGrid::new(
        Some(target_crs),
        GeoTransform::new(bounds.min_x, bounds.max_y, resolution, resolution),
        width,
        height,
    )?;
    Ok(grid)
}

/// Reproject `tile` into `target_crs` on a [`suggested_grid`].
///
/// A tile already in `target_crs` is returned unchanged.
pub fn reproject_to_crs(
    tile: &RasterTile,
    target_crs: Crs,
    method: ResampleMethod,
) -> Result<RasterTile> {
    if tile.grid().crs == Some(target_crs) {
        return Ok(tile.clone());
    }

    let target = suggested_grid(tile.grid(), target_crs)?;
    tracing::debug!(
        from = ?tile.grid().crs,
        to = %target_crs,
        width = target.width,
        height = target.height,
        "Reprojecting raster"
    );
    warp(tile, &target, method)
}
