//! Acquisition of JRC satellite-derived flood depth tiles.
//!
//! The archive publishes one directory-listing page per year. Every `.tif`
//! linked from a year's page is fetched into `<output_dir>/<year>/`, which is
//! the layout the event stage scans.
//!
//! ```text
//! <base_url>/2021/  ──► index page ──► tile links ──► <output_dir>/2021/<tile>.tif
//! ```
//!
//! Tiles already on disk are skipped, so reruns only fetch what is missing.

pub mod config;
pub mod download;
pub mod error;
pub mod index;

pub use config::{DownloadConfig, JRC_DEPTH_MAPS_URL};
pub use download::{DownloadReport, TileDownloader, TileOutcome};
pub use error::{DownloadError, Result};
pub use index::{file_name, LinkExtractor};
