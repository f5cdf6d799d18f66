//! Event keys from tile file names, and grouping of tiles by event.
//!
//! Tile names look like
//! `WD_MERGE_2024-12-16---2024-12-23_duration_7d_E054N012T3.tif`.
//! The prefix is configurable; the date block and `_duration_` marker are not.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use flood_common::EventKey;
use regex::Regex;
use thiserror::Error;

use crate::error::{PipelineError, Result};

/// Why a name did not yield an event key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternMismatch {
    /// The name does not carry the tile prefix at all; unrelated file.
    #[error("'{name}' is not a tile")]
    NotATile { name: String },

    /// The name carries the prefix but no well-formed event period.
    #[error("malformed tile name '{name}': {reason}")]
    Malformed { name: String, reason: String },
}

/// Parses tile names into [`EventKey`]s.
#[derive(Debug, Clone)]
pub struct EventKeyExtractor {
    marker: String,
    pattern: Regex,
}

impl EventKeyExtractor {
    /// Extractor for tiles named `<tile_prefix>_<start>---<end>_duration_...`.
    pub fn new(tile_prefix: &str) -> Result<Self> {
        if tile_prefix.is_empty() {
            return Err(PipelineError::config("tile prefix must not be empty"));
        }
        let pattern = Regex::new(&format!(
            r"^{}_(\d{{4}}-\d{{2}}-\d{{2}})---(\d{{4}}-\d{{2}}-\d{{2}})_duration_",
            regex::escape(tile_prefix)
        ))
        .map_err(|e| PipelineError::config(format!("invalid tile prefix: {}", e)))?;

        Ok(Self {
            marker: format!("{}_", tile_prefix),
            pattern,
        })
    }

    /// Event key encoded in a tile name.
    pub fn extract(&self, name: &str) -> std::result::Result<EventKey, PatternMismatch> {
        if !name.starts_with(&self.marker) {
            return Err(PatternMismatch::NotATile {
                name: name.to_string(),
            });
        }

        let captures = self.pattern.captures(name).ok_or_else(|| PatternMismatch::Malformed {
            name: name.to_string(),
            reason: "expected <start>---<end>_duration_ after the prefix".to_string(),
        })?;

        EventKey::from_date_strs(&captures[1], &captures[2]).map_err(|e| PatternMismatch::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Event key for the file at `path`, judged by its file name.
    pub fn extract_path(&self, path: &Path) -> std::result::Result<EventKey, PatternMismatch> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.extract(&name)
    }

    /// Group `paths` by event, keeping first-seen order of events and tiles.
    ///
    /// Unrelated files and malformed names are collected, never fatal.
    pub fn group<I>(&self, paths: I) -> EventGrouping
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut grouping = EventGrouping::default();
        let mut index: HashMap<EventKey, usize> = HashMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for path in paths {
            if !seen.insert(path.clone()) {
                continue;
            }

            match self.extract_path(&path) {
                Ok(key) => {
                    let slot = *index.entry(key).or_insert_with(|| {
                        grouping.groups.push(EventGroup::new(key));
                        grouping.groups.len() - 1
                    });
                    grouping.groups[slot].tiles.push(path);
                }
                Err(PatternMismatch::NotATile { .. }) => {
                    tracing::debug!(path = %path.display(), "Ignoring file that is not a tile");
                    grouping.ignored.push(path);
                }
                Err(mismatch @ PatternMismatch::Malformed { .. }) => {
                    tracing::warn!(path = %path.display(), error = %mismatch, "Skipping malformed tile");
                    grouping.malformed.push((path, mismatch));
                }
            }
        }

        grouping
    }
}

/// Tiles of one event, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    pub key: EventKey,
    pub tiles: Vec<PathBuf>,
}

impl EventGroup {
    pub fn new(key: EventKey) -> Self {
        Self {
            key,
            tiles: Vec::new(),
        }
    }
}

/// Result of grouping a directory listing.
#[derive(Debug, Clone, Default)]
pub struct EventGrouping {
    /// One entry per event, in first-seen order.
    pub groups: Vec<EventGroup>,
    /// Files without the tile prefix.
    pub ignored: Vec<PathBuf>,
    /// Files with the prefix but an unparseable period.
    pub malformed: Vec<(PathBuf, PatternMismatch)>,
}

impl EventGrouping {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of grouped tiles.
    pub fn tile_count(&self) -> usize {
        self.groups.iter().map(|g| g.tiles.len()).sum()
    }

    pub fn get(&self, key: &EventKey) -> Option<&EventGroup> {
        self.groups.iter().find(|g| &g.key == key)
    }
}
