//! Directory scanning for raster inputs.

use std::path::{Path, PathBuf};

use flood_common::COMPOSITE_STEM;
use grid_processor::{RasterFormat, STAGING_SUFFIX};
use walkdir::{DirEntry, WalkDir};

use crate::error::{PipelineError, Result};

fn file_name(entry: &DirEntry) -> &str {
    entry.file_name().to_str().unwrap_or("")
}

/// True for the global composite and for half-written artifacts.
fn is_excluded(name: &str) -> bool {
    name.starts_with(COMPOSITE_STEM) || name.ends_with(STAGING_SUFFIX)
}

fn scan(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| PipelineError::io(root, e))?;
    if !meta.is_dir() {
        return Err(PipelineError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(file_name(e)));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let format = RasterFormat::from_path(entry.path());
        if entry.file_type().is_dir() {
            // A Zarr store is one raster; never look inside it
            if format == Some(RasterFormat::Zarr) {
                found.push(entry.into_path());
                walker.skip_current_dir();
            }
        } else if format == Some(RasterFormat::GeoTiff) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// Every raster under `root`, recursively, in file-name order.
///
/// GeoTIFF files and Zarr stores are returned; the composite artifact and
/// staging directories are not.
///
/// # Errors
/// `Io` when `root` is missing or not a directory.
pub fn scan_rasters(root: &Path) -> Result<Vec<PathBuf>> {
    let found = scan(root, usize::MAX)?;
    tracing::debug!(root = %root.display(), rasters = found.len(), "Scanned input tree");
    Ok(found)
}

/// Rasters directly inside `dir` (event artifacts), excluding the composite.
pub fn scan_event_rasters(dir: &Path) -> Result<Vec<PathBuf>> {
    scan(dir, 1)
}
