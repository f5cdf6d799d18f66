//! Storage settings for persisted rasters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How persisted rasters are encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sample type written to disk.
    pub precision: OutputPrecision,

    /// Compression codec for Zarr arrays.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Chunk dimension (square chunks).
    pub chunk_size: usize,

    /// Enable the Blosc byte shuffle filter.
    pub shuffle: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            precision: OutputPrecision::Float32,
            compression: ZarrCompression::BloscLz4,
            compression_level: 5,
            chunk_size: 512,
            shuffle: true,
        }
    }
}

impl StorageConfig {
    /// Defaults overridden by `FLOOD_*` environment variables.
    ///
    /// Unparseable values are reported rather than ignored.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables that are set.
    pub fn apply_env(&mut self) -> Result<(), String> {
        if let Ok(val) = std::env::var("FLOOD_OUTPUT_PRECISION") {
            self.precision = val.parse()?;
        }

        if let Ok(val) = std::env::var("FLOOD_COMPRESSION") {
            self.compression = val.parse()?;
        }

        if let Ok(val) = std::env::var("FLOOD_COMPRESSION_LEVEL") {
            self.compression_level = val
                .parse()
                .map_err(|_| format!("FLOOD_COMPRESSION_LEVEL is not a number: '{}'", val))?;
        }

        if let Ok(val) = std::env::var("FLOOD_CHUNK_SIZE") {
            self.chunk_size = val
                .parse()
                .map_err(|_| format!("FLOOD_CHUNK_SIZE is not a number: '{}'", val))?;
        }

        if let Ok(val) = std::env::var("FLOOD_SHUFFLE") {
            self.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("storage chunk_size must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("storage compression_level must be 1-9".to_string());
        }

        Ok(())
    }
}

/// Sample type of persisted rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputPrecision {
    #[default]
    Float32,
    Float64,
}

impl OutputPrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

impl FromStr for OutputPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            other => Err(format!("unknown output precision '{}'", other)),
        }
    }
}

impl fmt::Display for OutputPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression codec for Zarr arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4, no shuffle.
    Lz4,
    /// Blosc with Zstd, no shuffle.
    Zstd,
    /// Blosc with LZ4.
    #[default]
    BloscLz4,
    /// Blosc with Zstd.
    BloscZstd,
}

impl ZarrCompression {
    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for ZarrCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            "blosc_lz4" => Ok(Self::BloscLz4),
            "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

impl fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.precision, OutputPrecision::Float32);
        assert_eq!(config.compression, ZarrCompression::BloscLz4);
        assert_eq!(config.compression_level, 5);
        assert_eq!(config.chunk_size, 512);
        assert!(config.shuffle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StorageConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        config = StorageConfig::default();
        config.compression_level = 0;
        assert!(config.validate().is_err());

        config.compression_level = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zarr_compression_from_str() {
        assert_eq!("none".parse(), Ok(ZarrCompression::None));
        assert_eq!("lz4".parse(), Ok(ZarrCompression::Lz4));
        assert_eq!("BLOSC_ZSTD".parse(), Ok(ZarrCompression::BloscZstd));
        assert!("lzw".parse::<ZarrCompression>().is_err());
    }

    #[test]
    fn test_precision_from_str() {
        assert_eq!("float64".parse(), Ok(OutputPrecision::Float64));
        assert_eq!("F32".parse(), Ok(OutputPrecision::Float32));
        assert!("int16".parse::<OutputPrecision>().is_err());
        assert_eq!(OutputPrecision::Float64.size(), 8);
    }

    #[test]
    fn test_partial_fragment_with_defaults() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"precision": "float64", "compression": "blosc_zstd"}"#).unwrap();
        assert_eq!(config.precision, OutputPrecision::Float64);
        assert_eq!(config.compression, ZarrCompression::BloscZstd);
        assert_eq!(config.chunk_size, 512);
    }
}
