//! Pipeline configuration.
//!
//! Loaded from YAML, then overridden by `FLOOD_*` environment variables.
//! Every key is optional; missing keys take the defaults below.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flood_common::{composite_file_name, Crs};
use grid_processor::{AlignConfig, DownsampleMethod, RasterFormat, ResampleMethod, StorageConfig};
use projection::CoordTransformer;
use serde::{Deserialize, Serialize};
use tile_downloader::DownloadConfig;

use crate::boundary::Region;
use crate::error::{PipelineError, Result};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the tile tree (scanned recursively).
    pub input_dir: PathBuf,

    /// Where per-event mosaics are written.
    pub events_dir: PathBuf,

    /// Input of the composite stage, destination of the boundary filter and
    /// location of the composite itself.
    pub composite_dir: PathBuf,

    /// Tile name prefix preceding the event period.
    pub tile_prefix: String,

    /// Largest width or height of an event's aligned grid.
    pub max_event_dimension: usize,

    /// Largest width or height of the composite grid.
    pub max_global_dimension: usize,

    /// CRS assumed for tiles that carry none; `None` makes such tiles fail.
    pub default_crs: Option<Crs>,

    /// CRS of event mosaics and the composite.
    pub output_crs: Crs,

    pub resampling: ResampleMethod,

    pub downsample_method: DownsampleMethod,

    pub storage: StorageConfig,

    /// Events processed in parallel (1 = sequential).
    pub workers: usize,

    /// Regions of interest for the boundary filter.
    pub regions: Vec<Region>,

    /// Tile archive; downloads land in `input_dir/<year>/`.
    pub download: DownloadConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("JRC_flood_depth_maps"),
            events_dir: PathBuf::from("data/events_merged"),
            composite_dir: PathBuf::from("data/events_filtered"),
            tile_prefix: "WD_MERGE".to_string(),
            max_event_dimension: 2000,
            max_global_dimension: 2000,
            default_crs: Some(Crs::EQUI7_EUROPE),
            output_crs: Crs::WGS84,
            resampling: ResampleMethod::Nearest,
            downsample_method: DownsampleMethod::Mean,
            storage: StorageConfig::default(),
            workers: 1,
            regions: Vec::new(),
            download: DownloadConfig::default(),
        }
    }
}

fn env_parse<T>(name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = std::env::var(name) {
        *target = val
            .parse()
            .map_err(|e| PipelineError::config(format!("{}='{}': {}", name, val, e)))?;
    }
    Ok(())
}

/// Every configured CRS must initialize a transformer to WGS84, which the
/// boundary filter and the output grids rely on.
fn check_crs(name: &str, crs: Crs) -> Result<()> {
    CoordTransformer::new(crs, Crs::WGS84)
        .map(|_| ())
        .map_err(|e| PipelineError::config(format!("{} {}: {}", name, crs, e)))
}

impl PipelineConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::config(format!("invalid YAML: {}", e)))
    }

    /// Load a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_yaml_str(&content)
            .map_err(|e| PipelineError::config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables that are set.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("FLOOD_INPUT_DIR") {
            self.input_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FLOOD_EVENTS_DIR") {
            self.events_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FLOOD_COMPOSITE_DIR") {
            self.composite_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FLOOD_TILE_PREFIX") {
            self.tile_prefix = val;
        }

        env_parse("FLOOD_MAX_EVENT_DIMENSION", &mut self.max_event_dimension)?;
        env_parse("FLOOD_MAX_GLOBAL_DIMENSION", &mut self.max_global_dimension)?;
        env_parse("FLOOD_OUTPUT_CRS", &mut self.output_crs)?;
        env_parse("FLOOD_RESAMPLING", &mut self.resampling)?;
        env_parse("FLOOD_DOWNSAMPLE_METHOD", &mut self.downsample_method)?;
        env_parse("FLOOD_WORKERS", &mut self.workers)?;

        if let Ok(val) = std::env::var("FLOOD_DEFAULT_CRS") {
            self.default_crs = if val.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(val.parse().map_err(|e| {
                    PipelineError::config(format!("FLOOD_DEFAULT_CRS='{}': {}", val, e))
                })?)
            };
        }

        self.storage.apply_env().map_err(PipelineError::Config)?;
        self.download.apply_env().map_err(PipelineError::Config)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tile_prefix.trim().is_empty() {
            return Err(PipelineError::config("tile_prefix must not be empty"));
        }
        if self.max_event_dimension == 0 {
            return Err(PipelineError::config("max_event_dimension must be > 0"));
        }
        if self.max_global_dimension == 0 {
            return Err(PipelineError::config("max_global_dimension must be > 0"));
        }
        if self.workers == 0 {
            return Err(PipelineError::config("workers must be >= 1"));
        }
        check_crs("output_crs", self.output_crs)?;
        if let Some(crs) = self.default_crs {
            check_crs("default_crs", crs)?;
        }
        self.storage.validate().map_err(PipelineError::Config)?;
        self.download.validate().map_err(PipelineError::Config)?;
        Ok(())
    }

    /// Alignment settings for per-event mosaics.
    pub fn event_align_config(&self) -> AlignConfig {
        AlignConfig {
            max_dimension: self.max_event_dimension,
            default_crs: self.default_crs,
            resampling: self.resampling,
            downsample: self.downsample_method,
        }
    }

    /// Alignment settings for the composite grid.
    pub fn global_align_config(&self) -> AlignConfig {
        AlignConfig {
            max_dimension: self.max_global_dimension,
            ..self.event_align_config()
        }
    }

    /// Output location of the composite.
    pub fn composite_path(&self) -> PathBuf {
        self.composite_dir
            .join(composite_file_name(RasterFormat::Zarr.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_processor::{OutputPrecision, ZarrCompression};

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_crs, Some(Crs::EQUI7_EUROPE));
        assert_eq!(config.output_crs, Crs::WGS84);
        assert_eq!(config.workers, 1);
        assert_eq!(config.composite_path(), PathBuf::from("data/events_filtered/flood_ALL_events.zarr"));
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
input_dir: /data/jrc
tile_prefix: WD_MERGE
max_event_dimension: 1000
default_crs: null
output_crs: "EPSG:3857"
resampling: bilinear
downsample_method: max
workers: 4
storage:
  precision: float64
  compression: blosc_zstd
regions:
  - name: Italy
    bbox: [6.6, 36.6, 18.5, 47.1]
download:
  first_year: 2020
  max_concurrent: 8
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/data/jrc"));
        assert_eq!(config.max_event_dimension, 1000);
        assert_eq!(config.max_global_dimension, 2000);
        assert_eq!(config.default_crs, None);
        assert_eq!(config.output_crs, Crs::WEB_MERCATOR);
        assert_eq!(config.resampling, ResampleMethod::Bilinear);
        assert_eq!(config.downsample_method, DownsampleMethod::Max);
        assert_eq!(config.storage.precision, OutputPrecision::Float64);
        assert_eq!(config.storage.compression, ZarrCompression::BloscZstd);
        assert_eq!(config.storage.chunk_size, 512);
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.download.years(), 2020..=2024);
        assert_eq!(config.download.max_concurrent, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            PipelineConfig::from_yaml_str("output_crs: [1, 2]"),
            Err(PipelineError::Config(_))
        ));
        assert!(PipelineConfig::from_yaml_str("resampling: cubic").is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.workers = 1;
        config.max_global_dimension = 0;
        assert!(config.validate().is_err());

        config.max_global_dimension = 10;
        config.output_crs = Crs::from_epsg(99999);
        assert!(config.validate().is_err());

        config.output_crs = Crs::WGS84;
        config.default_crs = Some(Crs::from_epsg(99999));
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_default_crs_initializes() {
        // Equi7 Europe needs the azimuthal equidistant projection
        let config = PipelineConfig::default();
        assert_eq!(config.default_crs, Some(Crs::EQUI7_EUROPE));
        assert!(check_crs("default_crs", Crs::EQUI7_EUROPE).is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_align_configs() {
        let config = PipelineConfig {
            max_event_dimension: 100,
            max_global_dimension: 500,
            ..Default::default()
        };
        assert_eq!(config.event_align_config().max_dimension, 100);
        assert_eq!(config.global_align_config().max_dimension, 500);
        assert_eq!(config.global_align_config().default_crs, config.default_crs);
    }
}
