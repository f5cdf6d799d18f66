//! Stage drivers.

use crate::boundary::{filter_event_rasters, FilterReport, RegionFilter};
use crate::composite::{CompositeOutcome, GlobalCompositeBuilder};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::EventKeyExtractor;
use crate::mosaic::EventMosaicBuilder;
use crate::scan::{scan_event_rasters, scan_rasters};
use crate::summary::RunSummary;
use tile_downloader::{DownloadReport, TileDownloader};

/// Runs the pipeline stages against one validated configuration.
///
/// Every stage returns `Err` only for run-level problems (missing input
/// root, unusable destination); per-event failures land in the result.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch missing tiles from the archive into `input_dir/<year>/`.
    pub async fn run_download(&self) -> Result<DownloadReport> {
        let downloader = TileDownloader::new(self.config.download.clone())?;
        tracing::info!(
            base_url = %downloader.config().base_url,
            first_year = self.config.download.first_year,
            last_year = self.config.download.last_year,
            output = %self.config.input_dir.display(),
            "Downloading tiles"
        );
        Ok(downloader.run(&self.config.input_dir).await?)
    }

    /// Stage 1: one mosaic per event found under `input_dir`.
    pub fn run_events(&self) -> Result<RunSummary> {
        let extractor = EventKeyExtractor::new(&self.config.tile_prefix)?;
        let paths = scan_rasters(&self.config.input_dir)?;
        let grouping = extractor.group(paths);

        tracing::info!(
            input = %self.config.input_dir.display(),
            events = grouping.groups.len(),
            tiles = grouping.tile_count(),
            workers = self.config.workers,
            "Grouped tiles by event"
        );

        let builder = EventMosaicBuilder::new(&self.config);
        let outcomes = builder.build_all(&grouping.groups, self.config.workers);

        let summary = RunSummary::new(&grouping, &outcomes);
        summary.log();
        Ok(summary)
    }

    /// Copy event mosaics touching a configured region into `composite_dir`.
    pub fn run_filter(&self) -> Result<FilterReport> {
        let filter = RegionFilter::new(self.config.regions.clone())?;
        let inputs = scan_event_rasters(&self.config.events_dir)?;
        let report = filter_event_rasters(&filter, &inputs, &self.config.composite_dir)?;

        tracing::info!(
            kept = report.kept.len(),
            rejected = report.rejected.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "Boundary filter complete"
        );
        Ok(report)
    }

    /// Stage 2: the global composite over every event raster in `composite_dir`.
    pub fn run_composite(&self) -> Result<CompositeOutcome> {
        let inputs = scan_event_rasters(&self.config.composite_dir)?;
        GlobalCompositeBuilder::new(&self.config).build(&inputs)
    }
}
