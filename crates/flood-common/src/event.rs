//! Flood event identity and artifact naming.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// Prefix of every persisted flood artifact.
pub const EVENT_FILE_PREFIX: &str = "flood_";

/// File stem of the global composite raster.
pub const COMPOSITE_STEM: &str = "flood_ALL_events";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TOKEN_SEPARATOR: &str = "__";

/// Identity of one flood event: the (start, end) date pair encoded in its tile names.
///
/// Ordering is chronological by start date, then end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    start: NaiveDate,
    end: NaiveDate,
}

impl EventKey {
    /// Create a key, rejecting periods that end before they start.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CommonError> {
        if end < start {
            return Err(CommonError::InvalidEventKey {
                input: format!("{}---{}", start, end),
                reason: "end date precedes start date".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn from_date_strs(start: &str, end: &str) -> Result<Self, CommonError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| CommonError::InvalidEventKey {
                input: s.to_string(),
                reason: e.to_string(),
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Event duration in whole days (0 for single-day events).
    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Canonical grouping token: `<start>__<end>`.
    pub fn token(&self) -> String {
        format!(
            "{}{}{}",
            self.start.format(DATE_FORMAT),
            TOKEN_SEPARATOR,
            self.end.format(DATE_FORMAT)
        )
    }

    /// Recover a key from a persisted artifact name such as
    /// `flood_2024-12-16__2024-12-23.zarr`.
    pub fn from_artifact_name(name: &str) -> Option<Self> {
        let stem = name.split('.').next()?;
        stem.strip_prefix(EVENT_FILE_PREFIX)?.parse().ok()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for EventKey {
    type Err = CommonError;

    /// Parse the canonical `<start>__<end>` token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) =
            s.split_once(TOKEN_SEPARATOR)
                .ok_or_else(|| CommonError::InvalidEventKey {
                    input: s.to_string(),
                    reason: format!("missing '{}' separator", TOKEN_SEPARATOR),
                })?;
        Self::from_date_strs(start, end)
    }
}

/// Output file name for one event: `flood_<start>__<end>.<ext>`.
pub fn event_file_name(key: &EventKey, ext: &str) -> String {
    format!("{}{}.{}", EVENT_FILE_PREFIX, key.token(), ext)
}

/// Output file name for the global composite: `flood_ALL_events.<ext>`.
pub fn composite_file_name(ext: &str) -> String {
    format!("{}.{}", COMPOSITE_STEM, ext)
}
