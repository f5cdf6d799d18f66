//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coordinate reference system identified by its EPSG code.
///
/// Serializes as `"EPSG:<code>"`, which is also how it is stored in
/// raster attributes and configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 geographic (lon/lat in degrees).
    pub const WGS84: Crs = Crs { epsg: 4326 };
    /// Web Mercator (meters).
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };
    /// Equi7Grid Europe, the native grid of the JRC flood depth tiles.
    pub const EQUI7_EUROPE: Crs = Crs { epsg: 27704 };

    /// Create from a raw EPSG code.
    pub const fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// The EPSG code.
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4258 | 4269)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = CrsParseError;

    /// Accepts `EPSG:<code>` (any case) and `CRS:84`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();

        if normalized == "CRS:84" {
            return Ok(Crs::WGS84);
        }

        let code = normalized
            .strip_prefix("EPSG:")
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))?;

        code.parse::<u32>()
            .ok()
            .filter(|c| *c > 0)
            .map(Crs::from_epsg)
            .ok_or_else(|| CrsParseError::InvalidCode(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid EPSG code: {0}")]
    InvalidCode(String),
}
