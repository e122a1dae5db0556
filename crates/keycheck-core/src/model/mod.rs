//! Key records, per-key results, and the closed status set.

mod status;

pub use status::StatusCode;

use serde::{Deserialize, Serialize};

/// Characters of a key shown in progress output before the ellipsis.
const PREVIEW_CHARS: usize = 10;

/// One activation key and where it came from in the imported table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub value: String,
    pub source_column: String,
    pub source_row_index: usize,
}

impl KeyRecord {
    pub fn new(value: impl Into<String>, source_column: impl Into<String>, source_row_index: usize) -> Self {
        Self {
            value: value.into(),
            source_column: source_column.into(),
            source_row_index,
        }
    }

    /// Truncated key for progress output, so full keys stay out of the UI.
    pub fn preview(&self) -> String {
        let head: String = self.value.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

/// Outcome of a single-key check before it is attached to its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVerdict {
    pub status: StatusCode,
    pub error_detail: Option<String>,
}

impl KeyVerdict {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            error_detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Error,
            error_detail: Some(detail.into()),
        }
    }

    pub fn stopped() -> Self {
        Self::status(StatusCode::Stopped)
    }
}

/// Result for one processed key. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub value: String,
    pub source_column: String,
    pub source_row_index: usize,
    pub status: StatusCode,
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl CheckResult {
    pub fn new(key: &KeyRecord, verdict: KeyVerdict) -> Self {
        Self {
            value: key.value.clone(),
            source_column: key.source_column.clone(),
            source_row_index: key.source_row_index,
            status: verdict.status,
            error_detail: verdict.error_detail,
        }
    }
}

/// Per-status counters shown at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultTally {
    pub activated: usize,
    pub not_activated: usize,
    pub other: usize,
}

impl ResultTally {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let mut tally = Self::default();
        for r in results {
            match r.status {
                StatusCode::Activated => tally.activated += 1,
                StatusCode::NotActivated => tally.not_activated += 1,
                _ => tally.other += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.activated + self.not_activated + self.other
    }
}
