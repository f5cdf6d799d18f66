//! Raster harmonization and NaN-aware merging for flood-depth grids.
//!
//! This crate holds the algorithmic core shared by the per-event mosaics and
//! the global composite:
//!
//! - **Alignment**: bring rasters of differing resolution, extent and CRS onto
//!   one grid, within a maximum-dimension budget
//! - **Cleaning**: sentinels and non-positive depths become NaN
//! - **Accumulation**: pixel-wise maximum with NaN as the identity
//! - **I/O**: GeoTIFF and Zarr readers behind [`RasterReader`], and a staged
//!   Zarr V3 writer
//!
//! # Architecture
//!
//! ```text
//! tiles of one event
//!      │
//!      ▼
//! GridAligner::align_to_base
//!      │
//!      ├─► assign default CRS to untagged inputs
//!      │
//!      ├─► coarsen every input by ceil(max_dim / budget)
//!      │
//!      └─► warp non-base inputs onto the base grid
//!               │
//!               ▼
//!          clean ──► MaxAccumulator::fold ──► RasterTile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{clean, merge_max, AlignConfig, GridAligner};
//!
//! let aligner = GridAligner::new(AlignConfig::default());
//! let aligned = aligner.align_to_base(tiles)?;
//!
//! let cleaned: Vec<_> = aligned.tiles.iter().map(clean).collect();
//! let merged = merge_max(&cleaned)?;
//! ```

pub mod accumulate;
pub mod align;
pub mod clean;
pub mod config;
pub mod downsample;
pub mod error;
pub mod projection;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use accumulate::{merge_max, nan_max, MaxAccumulator};
pub use align::{AlignConfig, AlignedSet, GridAligner};
pub use clean::clean;
pub use config::{OutputPrecision, StorageConfig, ZarrCompression};
pub use downsample::{coarsen, downsample_factor, DownsampleMethod};
pub use error::{GridProcessorError, Result};
pub use projection::{reproject_to_crs, suggested_grid, warp};
pub use reader::{read_grid, read_tile, reader_for, GeoTiffReader, RasterFormat, RasterReader, ZarrReader};
pub use types::{RasterTile, ResampleMethod};
pub use writer::{staging_path, RasterAttributes, ZarrWriteResult, ZarrWriter, STAGING_SUFFIX};
