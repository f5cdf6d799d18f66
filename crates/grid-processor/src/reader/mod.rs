//! Raster readers.
//!
//! [`RasterReader`] is the seam between the pipeline and on-disk formats.
//! `read_grid` only touches metadata, so callers that just need extents
//! (union grids, boundary filtering) never decode sample data.

mod geotiff;
mod zarr_reader;

use std::path::Path;

use flood_common::RasterGrid;

use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;

pub use geotiff::GeoTiffReader;
pub use zarr_reader::ZarrReader;

/// Reads single-band depth rasters.
pub trait RasterReader: Send + Sync {
    /// Grid description without sample data.
    fn read_grid(&self, path: &Path) -> Result<RasterGrid>;

    /// Grid, samples and declared sentinel.
    fn read_tile(&self, path: &Path) -> Result<RasterTile>;
}

/// On-disk raster formats understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    GeoTiff,
    Zarr,
}

impl RasterFormat {
    /// Format implied by the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tif" | "tiff" => Some(Self::GeoTiff),
            "zarr" => Some(Self::Zarr),
            _ => None,
        }
    }

    /// Preferred extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::GeoTiff => "tif",
            Self::Zarr => "zarr",
        }
    }
}

/// Reader for the format implied by `path`.
pub fn reader_for(path: &Path) -> Result<Box<dyn RasterReader>> {
    match RasterFormat::from_path(path) {
        Some(RasterFormat::GeoTiff) => Ok(Box::new(GeoTiffReader)),
        Some(RasterFormat::Zarr) => Ok(Box::new(ZarrReader)),
        None => Err(GridProcessorError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Read the grid of the raster at `path`.
pub fn read_grid(path: &Path) -> Result<RasterGrid> {
    reader_for(path)?.read_grid(path)
}

/// Read the raster at `path`.
pub fn read_tile(path: &Path) -> Result<RasterTile> {
    reader_for(path)?.read_tile(path)
}
