//! Flood-depth event pipeline.
//!
//! Turns a tree of per-tile flood-depth rasters into one mosaic per flood
//! event, and folds every event mosaic into a global maximum-depth composite.
//!
//! # Architecture
//!
//! ```text
//! JRC archive ──TileDownloader──► input tree (per year)
//!                                      │
//! input tree ──scan──► EventKeyExtractor ──► EventGroup per event
//!                                              │
//!                         EventMosaicBuilder ◄─┘  (align, clean, merge, reproject)
//!                                              │
//!                              events_dir ◄────┘
//!                                  │
//!                       boundary filter (optional)
//!                                  │
//!                           composite_dir ──► GlobalCompositeBuilder ──► flood_ALL_events
//! ```
//!
//! Per-event failures never abort a run; they are collected in a
//! [`RunSummary`]. Existing artifacts are never rebuilt, so reruns are cheap.

pub mod boundary;
pub mod composite;
pub mod config;
pub mod error;
pub mod extract;
pub mod mosaic;
mod runner;
pub mod scan;
pub mod summary;

// Re-exports
pub use boundary::{filter_event_rasters, wgs84_bounds, BoundaryFilter, FilterReport, Region, RegionFilter};
pub use composite::{Composite, CompositeOutcome, GlobalCompositeBuilder};
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, Result};
pub use extract::{EventGroup, EventGrouping, EventKeyExtractor, PatternMismatch};
pub use mosaic::{EventMosaicBuilder, EventOutcome, EventState};
pub use runner::Pipeline;
pub use scan::{scan_event_rasters, scan_rasters};
pub use summary::{EventFailure, RunSummary};
pub use tile_downloader::{DownloadConfig, DownloadReport};
