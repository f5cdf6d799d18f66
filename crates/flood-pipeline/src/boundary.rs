//! Bounding-box filter that forwards event rasters touching regions of interest.
//!
//! The filter only ever sees a raster's extent in WGS84; it never touches
//! sample data.

use std::fs;
use std::path::{Path, PathBuf};

use flood_common::{BoundingBox, Crs};
use grid_processor::{read_grid, staging_path, GridProcessorError};
use projection::{transform_bounds, CoordTransformer};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Pass/no-pass predicate over a raster's WGS84 bounding box.
pub trait BoundaryFilter: Send + Sync {
    fn admits(&self, wgs84_bbox: &BoundingBox) -> bool;
}

/// Named WGS84 box, `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub bbox: [f64; 4],
}

impl Region {
    pub fn new(name: impl Into<String>, bbox: [f64; 4]) -> Self {
        Self {
            name: name.into(),
            bbox,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3])
    }
}

/// Admits rasters that intersect any of the configured regions.
#[derive(Debug, Clone)]
pub struct RegionFilter {
    regions: Vec<Region>,
}

impl RegionFilter {
    /// # Errors
    /// `Config` for an empty region list or a region without area.
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(PipelineError::config("boundary filter needs at least one region"));
        }
        if let Some(bad) = regions.iter().find(|r| !r.bounds().has_area()) {
            return Err(PipelineError::config(format!(
                "region '{}' has no area: {:?}",
                bad.name, bad.bbox
            )));
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

impl BoundaryFilter for RegionFilter {
    fn admits(&self, wgs84_bbox: &BoundingBox) -> bool {
        self.regions.iter().any(|r| r.bounds().intersects(wgs84_bbox))
    }
}

/// Outcome of filtering a directory of event rasters.
#[derive(Debug, Default)]
pub struct FilterReport {
    /// Copied into the destination.
    pub kept: Vec<PathBuf>,
    /// Outside every region.
    pub rejected: Vec<PathBuf>,
    /// Admitted but already present in the destination.
    pub existing: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, PipelineError)>,
}

/// Extent of the raster at `path` in WGS84.
pub fn wgs84_bounds(path: &Path) -> Result<BoundingBox> {
    let grid = read_grid(path)?;
    let crs = grid.crs.ok_or(GridProcessorError::UnreferencedGrid)?;
    let transformer = CoordTransformer::new(crs, Crs::WGS84)?;
    Ok(transform_bounds(&transformer, &grid.bounds())?)
}

/// Copy every raster in `inputs` admitted by `filter` into `dest`.
///
/// Copies are staged and renamed like written artifacts. Per-raster failures
/// are recorded in the report; only an unusable destination is an error.
pub fn filter_event_rasters(
    filter: &dyn BoundaryFilter,
    inputs: &[PathBuf],
    dest: &Path,
) -> Result<FilterReport> {
    fs::create_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;
    let mut report = FilterReport::default();

    for path in inputs {
        let bounds = match wgs84_bounds(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot determine raster extent");
                report.failed.push((path.clone(), e));
                continue;
            }
        };

        if !filter.admits(&bounds) {
            tracing::debug!(path = %path.display(), "Outside regions, skipping");
            report.rejected.push(path.clone());
            continue;
        }

        let Some(name) = path.file_name() else {
            continue;
        };
        let target = dest.join(name);
        if target.exists() {
            report.existing.push(target);
            continue;
        }

        match copy_staged(path, &target) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Kept event raster");
                report.kept.push(target);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to copy event raster");
                report.failed.push((path.clone(), e));
            }
        }
    }

    Ok(report)
}

/// Copy a file or a directory tree to `target` through a staging location.
fn copy_staged(source: &Path, target: &Path) -> Result<()> {
    let staging = staging_path(target);
    if staging.exists() {
        remove_path(&staging)?;
    }

    let copied = if source.is_dir() {
        copy_tree(source, &staging)
    } else {
        fs::copy(source, &staging)
            .map(|_| ())
            .map_err(|e| PipelineError::io(source, e))
    };

    if let Err(e) = copied {
        let _ = remove_path(&staging);
        return Err(e);
    }
    fs::rename(&staging, target).map_err(|e| PipelineError::io(target, e))
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            PipelineError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| PipelineError::io(&destination, e))?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|e| PipelineError::io(entry.path(), e))?;
        }
    }
    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| PipelineError::io(path, e))
}
