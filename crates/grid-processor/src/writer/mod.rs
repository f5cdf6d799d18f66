//! Zarr writer for persisting event and composite rasters.

mod zarr_writer;

pub use zarr_writer::{staging_path, RasterAttributes, ZarrWriteResult, ZarrWriter, STAGING_SUFFIX};
