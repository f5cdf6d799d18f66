//! Zarr V3 writer for persisting depth rasters.
//!
//! Each artifact is one 2-D array in its own directory store. The array is
//! first written to `<name>.partial` and renamed into place once complete,
//! so a half-written artifact never looks like a finished one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flood_common::{BoundingBox, Crs, EventKey, GeoTransform};
use serde::{Deserialize, Serialize};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::config::{OutputPrecision, StorageConfig, ZarrCompression};
use crate::error::{GridProcessorError, Result};
use crate::types::RasterTile;

/// Suffix of the staging directory an artifact is written into.
pub const STAGING_SUFFIX: &str = ".partial";

/// Georeferencing attributes stored alongside every array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterAttributes {
    /// `None` for rasters that never had a coordinate reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
    /// GDAL coefficient order.
    pub geotransform: [f64; 6],
    /// `[min_x, min_y, max_x, max_y]` in CRS units.
    pub bbox: [f64; 4],
    /// Event token for per-event artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
}

impl RasterAttributes {
    fn for_tile(tile: &RasterTile, event: Option<&EventKey>) -> Self {
        let b = tile.bounds();
        Self {
            crs: tile.grid().crs,
            geotransform: tile.grid().transform.to_gdal(),
            bbox: [b.min_x, b.min_y, b.max_x, b.max_y],
            event: event.map(|k| k.token()),
            nodata: tile.nodata().map(f64::from),
        }
    }

    pub fn transform(&self) -> Result<GeoTransform> {
        Ok(GeoTransform::from_gdal(self.geotransform)?)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3])
    }

    /// Serialize into a Zarr attribute map.
    pub fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(GridProcessorError::invalid_metadata(format!(
                "attributes serialized to {}",
                other
            ))),
        }
    }

    /// Parse from a Zarr attribute map.
    pub fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(map.clone()))?)
    }
}

/// Result of writing a Zarr array.
#[derive(Debug)]
pub struct ZarrWriteResult {
    /// Final location of the artifact.
    pub path: PathBuf,
    pub attributes: RasterAttributes,
    /// Array shape as (width, height).
    pub shape: (usize, usize),
    pub precision: OutputPrecision,
    /// Uncompressed size of the sample data.
    pub bytes_written: u64,
}

/// Writer for creating Zarr V3 arrays from depth rasters.
#[derive(Debug, Clone)]
pub struct ZarrWriter {
    config: StorageConfig,
}

impl ZarrWriter {
    /// Create a new ZarrWriter with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Persist `tile` as a Zarr array at `path`.
    ///
    /// Refuses to replace an existing artifact. A leftover staging directory
    /// from an interrupted run is discarded first.
    pub fn write(
        &self,
        path: &Path,
        tile: &RasterTile,
        event: Option<&EventKey>,
    ) -> Result<ZarrWriteResult> {
        if path.exists() {
            return Err(GridProcessorError::write_failed(format!(
                "{} already exists",
                path.display()
            )));
        }

        let staging = staging_path(path);
        if staging.exists() {
            tracing::warn!(path = %staging.display(), "Removing stale staging directory");
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let attributes = RasterAttributes::for_tile(tile, event);
        if let Err(e) = self.write_array(&staging, tile, &attributes) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                tracing::warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "Failed to remove staging directory"
                );
            }
            return Err(e);
        }

        fs::rename(&staging, path).map_err(|e| {
            GridProcessorError::write_failed(format!(
                "failed to move {} into place: {}",
                staging.display(),
                e
            ))
        })?;

        let bytes_written = (tile.data().len() * self.config.precision.size()) as u64;
        tracing::debug!(
            path = %path.display(),
            width = tile.width(),
            height = tile.height(),
            precision = %self.config.precision,
            compression = %self.config.compression,
            "Wrote Zarr array"
        );

        Ok(ZarrWriteResult {
            path: path.to_path_buf(),
            attributes,
            shape: (tile.width(), tile.height()),
            precision: self.config.precision,
            bytes_written,
        })
    }

    fn write_array(&self, dir: &Path, tile: &RasterTile, attributes: &RasterAttributes) -> Result<()> {
        let (width, height) = (tile.width() as u64, tile.height() as u64);
        let chunk = (self.config.chunk_size as u64).max(1);

        let store = Arc::new(
            FilesystemStore::new(dir).map_err(|e| GridProcessorError::StorageError(e.to_string()))?,
        );

        let chunk_grid: zarrs::array::ChunkGrid = vec![chunk.min(height), chunk.min(width)]
            .try_into()
            .map_err(|e| GridProcessorError::ConfigError(format!("{:?}", e)))?;

        let (data_type, fill_value) = match self.config.precision {
            OutputPrecision::Float32 => (DataType::Float32, FillValue::from(f32::NAN)),
            OutputPrecision::Float64 => (DataType::Float64, FillValue::from(f64::NAN)),
        };

        // Shape is [rows, cols]
        let mut binding = ArrayBuilder::new(vec![height, width], data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attributes.to_map()?);
        if let Some(codec) = self.compression_codec()? {
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(store, "/")
            .map_err(|e| GridProcessorError::StorageError(e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| GridProcessorError::write_failed(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height, width])
            .map_err(|e| GridProcessorError::StorageError(e.to_string()))?;

        match self.config.precision {
            OutputPrecision::Float32 => array.store_array_subset_elements(&subset, tile.data()),
            OutputPrecision::Float64 => {
                let wide: Vec<f64> = tile.data().iter().map(|&v| f64::from(v)).collect();
                array.store_array_subset_elements(&subset, &wide)
            }
        }
        .map_err(|e| GridProcessorError::write_failed(e.to_string()))?;

        Ok(())
    }

    /// Create the compression codec based on configuration.
    fn compression_codec(
        &self,
    ) -> Result<Option<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>>> {
        let compressor = match self.config.compression {
            ZarrCompression::None => return Ok(None),
            ZarrCompression::Lz4 | ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::Zstd | ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| GridProcessorError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle_enabled = self.config.shuffle
            && matches!(
                self.config.compression,
                ZarrCompression::BloscLz4 | ZarrCompression::BloscZstd
            );

        let (shuffle, typesize) = if shuffle_enabled {
            (BloscShuffleMode::Shuffle, Some(self.config.precision.size()))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| GridProcessorError::ConfigError(e.to_string()))?;

        Ok(Some(Arc::new(codec)))
    }
}

/// Staging location for an artifact: its path with [`STAGING_SUFFIX`] appended.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_common::RasterGrid;

    fn tile(width: usize, height: usize) -> RasterTile {
        let grid = RasterGrid::new(
            Some(Crs::WGS84),
            GeoTransform::new(10.0, 46.0, 0.01, 0.01),
            width,
            height,
        )
        .unwrap();
        let data = (0..width * height).map(|i| i as f32 * 0.5).collect();
        RasterTile::new(grid, data, None).unwrap()
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/out/flood_a__b.zarr")),
            PathBuf::from("/out/flood_a__b.zarr.partial")
        );
    }

    #[test]
    fn test_write_creates_array_and_removes_staging() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out.zarr");

        let writer = ZarrWriter::new(StorageConfig {
            compression: ZarrCompression::None,
            ..Default::default()
        });
        let result = writer.write(&path, &tile(20, 10), None).expect("Failed to write");

        assert!(path.join("zarr.json").exists());
        assert!(!staging_path(&path).exists());
        assert_eq!(result.shape, (20, 10));
        assert_eq!(result.bytes_written, 800);
        assert_eq!(result.attributes.crs, Some(Crs::WGS84));
    }

    #[test]
    fn test_write_refuses_existing_artifact() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out.zarr");
        let writer = ZarrWriter::new(StorageConfig::default());

        writer.write(&path, &tile(4, 4), None).unwrap();
        let err = writer.write(&path, &tile(4, 4), None).unwrap_err();
        assert!(matches!(err, GridProcessorError::WriteFailed(_)));
    }

    #[test]
    fn test_write_replaces_stale_staging() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out.zarr");
        let stale = staging_path(&path);
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("junk"), b"x").unwrap();

        ZarrWriter::new(StorageConfig::default())
            .write(&path, &tile(4, 4), None)
            .unwrap();
        assert!(path.exists());
        assert!(!stale.exists());
        assert!(!path.join("junk").exists());
    }

    #[test]
    fn test_attributes_map_roundtrip() {
        let key = EventKey::from_date_strs("2024-12-16", "2024-12-23").unwrap();
        let attrs = RasterAttributes::for_tile(&tile(2, 2), Some(&key));
        let map = attrs.to_map().unwrap();

        assert_eq!(map["crs"], serde_json::json!("EPSG:4326"));
        assert_eq!(map["event"], serde_json::json!("2024-12-16__2024-12-23"));
        assert!(!map.contains_key("nodata"));
        assert_eq!(RasterAttributes::from_map(&map).unwrap(), attrs);
    }
}
