//! End-of-run reporting.

use std::path::PathBuf;

use flood_common::EventKey;

use crate::error::ErrorKind;
use crate::extract::EventGrouping;
use crate::mosaic::{EventOutcome, EventState};

/// One failed event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFailure {
    pub key: EventKey,
    pub kind: ErrorKind,
    pub state: EventState,
    pub input: Option<PathBuf>,
    pub message: String,
}

/// Counts and failures of one event-stage run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub persisted: Vec<EventKey>,
    pub skipped: Vec<EventKey>,
    pub failed: Vec<EventFailure>,
    /// Files that were not tiles.
    pub ignored_tiles: usize,
    /// Tiles whose name carried no usable event period.
    pub malformed_tiles: usize,
}

impl RunSummary {
    pub fn new(grouping: &EventGrouping, outcomes: &[EventOutcome]) -> Self {
        let mut summary = Self {
            ignored_tiles: grouping.ignored.len(),
            malformed_tiles: grouping.malformed.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome {
                EventOutcome::Persisted { key, .. } => summary.persisted.push(*key),
                EventOutcome::Skipped { key, .. } => summary.skipped.push(*key),
                EventOutcome::Failed {
                    key,
                    state,
                    input,
                    error,
                } => summary.failed.push(EventFailure {
                    key: *key,
                    kind: error.kind(),
                    state: *state,
                    input: input.clone(),
                    message: error.to_string(),
                }),
            }
        }

        summary
    }

    pub fn events(&self) -> usize {
        self.persisted.len() + self.skipped.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Emit the summary through `tracing`.
    pub fn log(&self) {
        for failure in &self.failed {
            tracing::warn!(
                event = %failure.key,
                kind = %failure.kind,
                state = %failure.state,
                input = ?failure.input,
                error = %failure.message,
                "Failed event"
            );
        }
        tracing::info!(
            events = self.events(),
            persisted = self.persisted.len(),
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            ignored_tiles = self.ignored_tiles,
            malformed_tiles = self.malformed_tiles,
            "Event run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::extract::PatternMismatch;
    use grid_processor::GridProcessorError;

    fn key(day: u32) -> EventKey {
        EventKey::from_date_strs(&format!("2024-03-{:02}", day), "2024-03-20").unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let grouping = EventGrouping {
            groups: Vec::new(),
            ignored: vec![PathBuf::from("readme.md")],
            malformed: vec![(
                PathBuf::from("WD_MERGE_x.tif"),
                PatternMismatch::Malformed {
                    name: "WD_MERGE_x.tif".to_string(),
                    reason: "no dates".to_string(),
                },
            )],
        };
        let outcomes = vec![
            EventOutcome::Persisted {
                key: key(1),
                path: PathBuf::from("a"),
                tiles: 2,
                width: 10,
                height: 10,
            },
            EventOutcome::Skipped {
                key: key(2),
                path: PathBuf::from("b"),
            },
            EventOutcome::Failed {
                key: key(3),
                state: EventState::Loaded,
                input: Some(PathBuf::from("t.tif")),
                error: PipelineError::from(GridProcessorError::MissingReference { index: 0 }),
            },
        ];

        let summary = RunSummary::new(&grouping, &outcomes);
        assert_eq!(summary.events(), 3);
        assert_eq!(summary.persisted, vec![key(1)]);
        assert_eq!(summary.skipped, vec![key(2)]);
        assert!(summary.has_failures());
        assert_eq!(summary.failed[0].kind, ErrorKind::MissingReference);
        assert_eq!(summary.failed[0].input, Some(PathBuf::from("t.tif")));
        assert_eq!(summary.ignored_tiles, 1);
        assert_eq!(summary.malformed_tiles, 1);
        summary.log();
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::new(&EventGrouping::default(), &[]);
        assert_eq!(summary.events(), 0);
        assert!(!summary.has_failures());
    }
}
