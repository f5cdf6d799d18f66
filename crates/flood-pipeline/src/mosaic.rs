//! Per-event mosaics: load, align, clean, merge, reproject, persist.

use std::fmt;
use std::path::{Path, PathBuf};

use flood_common::{event_file_name, Crs, EventKey};
use grid_processor::{
    clean, merge_max, read_tile, reproject_to_crs, GridAligner, GridProcessorError, RasterFormat,
    RasterTile, ResampleMethod, ZarrWriter,
};
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extract::EventGroup;

/// Progress of one event through the mosaic stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Pending,
    Loaded,
    Aligned,
    Cleaned,
    Merged,
    Reprojected,
    Persisted,
    Failed,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loaded => "loaded",
            Self::Aligned => "aligned",
            Self::Cleaned => "cleaned",
            Self::Merged => "merged",
            Self::Reprojected => "reprojected",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one event.
#[derive(Debug)]
pub enum EventOutcome {
    Persisted {
        key: EventKey,
        path: PathBuf,
        tiles: usize,
        width: usize,
        height: usize,
    },
    /// The artifact already existed; nothing was loaded.
    Skipped { key: EventKey, path: PathBuf },
    Failed {
        key: EventKey,
        /// Last state reached before the failure.
        state: EventState,
        /// Tile that caused the failure, when one input is to blame.
        input: Option<PathBuf>,
        error: PipelineError,
    },
}

impl EventOutcome {
    pub fn key(&self) -> &EventKey {
        match self {
            Self::Persisted { key, .. } | Self::Skipped { key, .. } | Self::Failed { key, .. } => key,
        }
    }

    /// Terminal state of the event.
    pub fn state(&self) -> EventState {
        match self {
            Self::Persisted { .. } | Self::Skipped { .. } => EventState::Persisted,
            Self::Failed { .. } => EventState::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

struct Failure {
    input: Option<PathBuf>,
    error: PipelineError,
}

impl From<PipelineError> for Failure {
    fn from(error: PipelineError) -> Self {
        Self { input: None, error }
    }
}

impl From<GridProcessorError> for Failure {
    fn from(error: GridProcessorError) -> Self {
        PipelineError::from(error).into()
    }
}

/// Turns one event's tiles into a single raster in the output CRS.
pub struct EventMosaicBuilder {
    aligner: GridAligner,
    writer: ZarrWriter,
    events_dir: PathBuf,
    output_crs: Crs,
    resampling: ResampleMethod,
}

impl EventMosaicBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            aligner: GridAligner::new(config.event_align_config()),
            writer: ZarrWriter::new(config.storage.clone()),
            events_dir: config.events_dir.clone(),
            output_crs: config.output_crs,
            resampling: config.resampling,
        }
    }

    /// Artifact location for `key`.
    pub fn output_path(&self, key: &EventKey) -> PathBuf {
        self.events_dir
            .join(event_file_name(key, RasterFormat::Zarr.extension()))
    }

    /// Mosaic of already loaded tiles, without touching disk.
    ///
    /// The first tile provides the base grid.
    pub fn mosaic(&self, key: &EventKey, tiles: Vec<RasterTile>) -> Result<RasterTile, PipelineError> {
        let mut state = EventState::Loaded;
        Ok(self.merge_loaded(key, tiles, &[], &mut state)?)
    }

    /// Build and persist the mosaic for one event.
    ///
    /// Never returns an error; failures are reported in the outcome.
    pub fn build(&self, group: &EventGroup) -> EventOutcome {
        let key = group.key;
        let path = self.output_path(&key);

        if path.exists() {
            tracing::info!(event = %key, path = %path.display(), "Event already merged, skipping");
            return EventOutcome::Skipped { key, path };
        }

        let mut state = EventState::Pending;
        match self.run(group, &path, &mut state) {
            Ok(tile) => {
                tracing::info!(
                    event = %key,
                    days = key.duration_days(),
                    path = %path.display(),
                    tiles = group.tiles.len(),
                    width = tile.width(),
                    height = tile.height(),
                    "Event merged"
                );
                EventOutcome::Persisted {
                    key,
                    path,
                    tiles: group.tiles.len(),
                    width: tile.width(),
                    height: tile.height(),
                }
            }
            Err(failure) => {
                tracing::error!(
                    event = %key,
                    state = %state,
                    input = ?failure.input,
                    error = %failure.error,
                    "Event failed"
                );
                EventOutcome::Failed {
                    key,
                    state,
                    input: failure.input,
                    error: failure.error,
                }
            }
        }
    }

    fn run(&self, group: &EventGroup, path: &Path, state: &mut EventState) -> Result<RasterTile, Failure> {
        let key = group.key;

        let mut tiles = Vec::with_capacity(group.tiles.len());
        for tile_path in &group.tiles {
            let tile = read_tile(tile_path).map_err(|e| Failure {
                input: Some(tile_path.clone()),
                error: e.into(),
            })?;
            tiles.push(tile);
        }
        advance(&key, state, EventState::Loaded);

        let output = self
            .merge_loaded(&key, tiles, &group.tiles, state)
            .map_err(|e| {
                let input = match &e {
                    GridProcessorError::MissingReference { index } => group.tiles.get(*index).cloned(),
                    _ => None,
                };
                Failure {
                    input,
                    error: e.into(),
                }
            })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        self.writer.write(path, &output, Some(&key))?;
        advance(&key, state, EventState::Persisted);

        Ok(output)
    }

    /// Align, clean, merge and reproject. `inputs` names the tiles in
    /// diagnostics and may be empty.
    fn merge_loaded(
        &self,
        key: &EventKey,
        tiles: Vec<RasterTile>,
        inputs: &[PathBuf],
        state: &mut EventState,
    ) -> Result<RasterTile, GridProcessorError> {
        let aligned = self.aligner.align_to_base(tiles)?;
        if let Some(crs) = self.aligner.config().default_crs {
            for &index in &aligned.defaulted {
                let path = inputs.get(index).map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(
                    event = %key,
                    tile = index,
                    path = %path,
                    crs = %crs,
                    "Tile has no coordinate reference, assuming default"
                );
            }
        }
        tracing::debug!(
            event = %key,
            factor = aligned.factor,
            width = aligned.grid.width,
            height = aligned.grid.height,
            "Tiles aligned"
        );
        advance(key, state, EventState::Aligned);

        let cleaned: Vec<RasterTile> = aligned.tiles.iter().map(clean).collect();
        drop(aligned);
        advance(key, state, EventState::Cleaned);

        let merged = merge_max(&cleaned)?;
        drop(cleaned);
        advance(key, state, EventState::Merged);

        let output = reproject_to_crs(&merged, self.output_crs, self.resampling)?;
        advance(key, state, EventState::Reprojected);
        Ok(output)
    }

    /// Build every group, `workers` events at a time.
    ///
    /// Outcomes are returned in the order of `groups`. Each event is handled
    /// by exactly one worker.
    pub fn build_all(&self, groups: &[EventGroup], workers: usize) -> Vec<EventOutcome> {
        if workers <= 1 || groups.len() <= 1 {
            return groups.iter().map(|g| self.build(g)).collect();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("flood-worker-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| groups.par_iter().map(|g| self.build(g)).collect()),
            Err(e) => {
                tracing::warn!(workers, error = %e, "Cannot start worker pool, processing sequentially");
                groups.iter().map(|g| self.build(g)).collect()
            }
        }
    }
}

fn advance(key: &EventKey, state: &mut EventState, next: EventState) {
    tracing::trace!(event = %key, from = %state, to = %next, "Event state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use flood_common::{GeoTransform, RasterGrid};
    use grid_processor::read_grid;
    use test_utils::{assert_depths_eq, temp_test_dir};

    fn config(events_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            events_dir: events_dir.to_path_buf(),
            default_crs: None,
            ..Default::default()
        }
    }

    fn wgs84_tile(origin: (f64, f64), width: usize, height: usize, data: Vec<f32>) -> RasterTile {
        let grid = RasterGrid::new(
            Some(Crs::WGS84),
            GeoTransform::new(origin.0, origin.1, 1.0, 1.0),
            width,
            height,
        )
        .unwrap();
        RasterTile::new(grid, data, None).unwrap()
    }

    fn write_tile(dir: &Path, name: &str, tile: &RasterTile) -> PathBuf {
        let path = dir.join(name);
        ZarrWriter::new(Default::default()).write(&path, tile, None).unwrap();
        path
    }

    fn key() -> EventKey {
        EventKey::from_date_strs("2024-12-16", "2024-12-23").unwrap()
    }

    #[test]
    fn test_mosaic_cleans_then_merges() {
        let dir = temp_test_dir();
        let builder = EventMosaicBuilder::new(&config(dir.path()));
        let a = wgs84_tile((0.0, 1.0), 3, 1, vec![1.0, -0.5, f32::NAN]);
        let b = wgs84_tile((0.0, 1.0), 3, 1, vec![0.3, 2.0, 5.0]);

        let out = builder.mosaic(&key(), vec![a, b]).unwrap();
        assert_depths_eq!(out.data(), &[1.0, 2.0, 5.0]);
    }

    #[test]
    fn test_mosaic_offsets_onto_base() {
        let dir = temp_test_dir();
        let builder = EventMosaicBuilder::new(&config(dir.path()));
        let base = wgs84_tile((0.0, 2.0), 2, 2, vec![1.0, 0.0, 0.0, 0.0]);
        // Overlaps only the base's right column
        let shifted = wgs84_tile((1.0, 2.0), 2, 2, vec![3.0, 9.0, 4.0, 9.0]);

        let out = builder.mosaic(&key(), vec![base, shifted]).unwrap();
        assert_eq!(out.width(), 2);
        assert_depths_eq!(out.data(), &[1.0, 3.0, f32::NAN, 4.0]);
    }

    #[test]
    fn test_mosaic_of_untagged_tile_under_default_config() {
        let dir = temp_test_dir();
        let config = PipelineConfig {
            events_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let builder = EventMosaicBuilder::new(&config);
        // Equi7 Europe metres near the projection centre, no CRS recorded
        let grid = RasterGrid::new(
            None,
            GeoTransform::new(5_837_000.0, 2_121_400.0, 100.0, 100.0),
            4,
            4,
        )
        .unwrap();
        let tile = RasterTile::new(grid, vec![1.5; 16], None).unwrap();

        let out = builder.mosaic(&key(), vec![tile]).unwrap();
        assert_eq!(out.grid().crs, Some(Crs::WGS84));
        let bounds = out.bounds();
        assert!(bounds.min_x > 23.9 && bounds.max_x < 24.1, "{:?}", bounds);
        assert!(bounds.min_y > 52.9 && bounds.max_y < 53.1, "{:?}", bounds);
        assert!(out.valid_count() > 0);
    }

    #[test]
    fn test_build_persists_then_skips() {
        let src = temp_test_dir();
        let out = temp_test_dir();
        let tile = wgs84_tile((10.0, 46.0), 2, 2, vec![0.5, 1.0, 1.5, 2.0]);
        let group = EventGroup {
            key: key(),
            tiles: vec![write_tile(src.path(), "a.zarr", &tile)],
        };
        let builder = EventMosaicBuilder::new(&config(out.path()));

        let first = builder.build(&group);
        let path = match &first {
            EventOutcome::Persisted { path, tiles, .. } => {
                assert_eq!(*tiles, 1);
                path.clone()
            }
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(path, out.path().join("flood_2024-12-16__2024-12-23.zarr"));
        assert_eq!(read_grid(&path).unwrap().crs, Some(Crs::WGS84));

        let second = builder.build(&group);
        assert!(matches!(second, EventOutcome::Skipped { .. }));
        assert_eq!(second.state(), EventState::Persisted);
    }

    #[test]
    fn test_unreadable_tile_names_input() {
        let src = temp_test_dir();
        let out = temp_test_dir();
        let broken = src.path().join("broken.tif");
        std::fs::write(&broken, b"not a tiff").unwrap();
        let group = EventGroup {
            key: key(),
            tiles: vec![broken.clone()],
        };

        let outcome = EventMosaicBuilder::new(&config(out.path())).build(&group);
        match outcome {
            EventOutcome::Failed { state, input, error, .. } => {
                assert_eq!(state, EventState::Pending);
                assert_eq!(input, Some(broken));
                assert_eq!(error.kind(), ErrorKind::IoFailure);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!out.path().join("flood_2024-12-16__2024-12-23.zarr").exists());
    }

    #[test]
    fn test_missing_reference_names_input() {
        let src = temp_test_dir();
        let out = temp_test_dir();
        let referenced = wgs84_tile((0.0, 1.0), 1, 1, vec![1.0]);
        let bare = RasterTile::new(
            RasterGrid::new(None, GeoTransform::new(0.0, 1.0, 1.0, 1.0), 1, 1).unwrap(),
            vec![2.0],
            None,
        )
        .unwrap();
        let group = EventGroup {
            key: key(),
            tiles: vec![
                write_tile(src.path(), "a.zarr", &referenced),
                write_tile(src.path(), "b.zarr", &bare),
            ],
        };

        let outcome = EventMosaicBuilder::new(&config(out.path())).build(&group);
        match outcome {
            EventOutcome::Failed { state, input, error, .. } => {
                assert_eq!(state, EventState::Loaded);
                assert_eq!(input, Some(src.path().join("b.zarr")));
                assert_eq!(error.kind(), ErrorKind::MissingReference);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_build_all_preserves_order_with_workers() {
        let src = temp_test_dir();
        let out = temp_test_dir();
        let builder = EventMosaicBuilder::new(&config(out.path()));

        let groups: Vec<EventGroup> = (1..=4)
            .map(|day| {
                let tile = wgs84_tile((day as f64, 1.0), 1, 1, vec![day as f32]);
                let name = format!("t{}.zarr", day);
                EventGroup {
                    key: EventKey::from_date_strs(&format!("2024-01-0{}", day), "2024-01-09").unwrap(),
                    tiles: vec![write_tile(src.path(), &name, &tile)],
                }
            })
            .collect();

        let outcomes = builder.build_all(&groups, 3);
        assert_eq!(outcomes.len(), 4);
        for (group, outcome) in groups.iter().zip(&outcomes) {
            assert_eq!(outcome.key(), &group.key);
            assert!(matches!(outcome, EventOutcome::Persisted { .. }));
        }
    }
}
