//! Common types shared across the flood-depth merge workspace.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod event;
pub mod grid;

pub use bbox::BoundingBox;
pub use crs::{Crs, CrsParseError};
pub use error::{CommonError, CommonResult};
pub use event::{
    composite_file_name, event_file_name, EventKey, COMPOSITE_STEM, EVENT_FILE_PREFIX,
};
pub use grid::{GeoTransform, RasterGrid};
