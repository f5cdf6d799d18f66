//! Global composite: pixel-wise maximum of every event mosaic over the union
//! of their extents.
//!
//! Event rasters are folded into the accumulator one at a time, so at most
//! one reprojected event is held next to the running maximum.

use std::path::{Path, PathBuf};

use flood_common::{Crs, RasterGrid};
use grid_processor::{clean, read_grid, read_tile, GridAligner, MaxAccumulator, RasterTile, ZarrWriter};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// What the composite stage did.
#[derive(Debug)]
pub enum CompositeOutcome {
    Persisted {
        path: PathBuf,
        /// Event rasters folded into the composite.
        events: usize,
        width: usize,
        height: usize,
        /// Event rasters left out, with the reason.
        skipped: Vec<(PathBuf, PipelineError)>,
    },
    /// The composite already existed.
    Skipped { path: PathBuf },
    /// No usable event raster.
    NoInputs { skipped: Vec<(PathBuf, PipelineError)> },
}

/// Composite raster plus the inputs that could not be used.
#[derive(Debug)]
pub struct Composite {
    /// `None` when no input could be folded.
    pub tile: Option<RasterTile>,
    pub events: usize,
    pub skipped: Vec<(PathBuf, PipelineError)>,
}

pub struct GlobalCompositeBuilder {
    aligner: GridAligner,
    writer: ZarrWriter,
    output_crs: Crs,
    path: PathBuf,
}

impl GlobalCompositeBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            aligner: GridAligner::new(config.global_align_config()),
            writer: ZarrWriter::new(config.storage.clone()),
            output_crs: config.output_crs,
            path: config.composite_path(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.path
    }

    /// Grids of the usable inputs, read from metadata only.
    ///
    /// An input is usable when its grid can be read and placed in the output
    /// CRS.
    fn usable_grids(&self, inputs: &[PathBuf]) -> (Vec<(PathBuf, RasterGrid)>, Vec<(PathBuf, PipelineError)>) {
        let mut usable = Vec::with_capacity(inputs.len());
        let mut skipped = Vec::new();

        for path in inputs {
            let checked = read_grid(path).map_err(PipelineError::from).and_then(|grid| {
                self.aligner
                    .union_grid(std::slice::from_ref(&grid), self.output_crs)
                    .map(|_| grid)
                    .map_err(PipelineError::from)
            });
            match checked {
                Ok(grid) => usable.push((path.clone(), grid)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Leaving event raster out of composite");
                    skipped.push((path.clone(), e));
                }
            }
        }

        (usable, skipped)
    }

    /// Fold `inputs` into one raster on their union grid, without writing.
    pub fn compose(&self, inputs: &[PathBuf]) -> Result<Composite> {
        let (usable, mut skipped) = self.usable_grids(inputs);
        if usable.is_empty() {
            return Ok(Composite {
                tile: None,
                events: 0,
                skipped,
            });
        }

        let grids: Vec<RasterGrid> = usable.iter().map(|(_, g)| g.clone()).collect();
        let union = self.aligner.union_grid(&grids, self.output_crs)?;
        drop(grids);

        tracing::info!(
            events = usable.len(),
            width = union.width,
            height = union.height,
            crs = %self.output_crs,
            "Composing event rasters"
        );

        let mut acc = MaxAccumulator::new(union.clone());
        for (index, (path, _)) in usable.iter().enumerate() {
            let folded = read_tile(path)
                .and_then(|tile| self.aligner.align_to_grid(index, tile, &union))
                .and_then(|aligned| acc.fold(&clean(&aligned)));

            match folded {
                Ok(()) => tracing::debug!(path = %path.display(), "Folded event raster"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Leaving event raster out of composite");
                    skipped.push((path.clone(), e.into()));
                }
            }
        }

        let events = acc.folded();
        let tile = (events > 0).then(|| acc.finish());
        Ok(Composite {
            tile,
            events,
            skipped,
        })
    }

    /// Build and persist the composite from `inputs`.
    ///
    /// # Errors
    /// Only when the union grid cannot be built or the composite cannot be
    /// written; unusable inputs are reported in the outcome.
    pub fn build(&self, inputs: &[PathBuf]) -> Result<CompositeOutcome> {
        if self.path.exists() {
            tracing::info!(path = %self.path.display(), "Composite already exists, skipping");
            return Ok(CompositeOutcome::Skipped {
                path: self.path.clone(),
            });
        }

        let Composite {
            tile,
            events,
            skipped,
        } = self.compose(inputs)?;
        let Some(tile) = tile else {
            tracing::warn!(inputs = inputs.len(), "No usable event rasters, composite not written");
            return Ok(CompositeOutcome::NoInputs { skipped });
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        self.writer.write(&self.path, &tile, None)?;

        tracing::info!(
            path = %self.path.display(),
            events,
            skipped = skipped.len(),
            "Composite written"
        );

        Ok(CompositeOutcome::Persisted {
            path: self.path.clone(),
            events,
            width: tile.width(),
            height: tile.height(),
            skipped,
        })
    }
}
