//! Run State and the transitions each checker event applies to it.

use serde::{Deserialize, Serialize};

use crate::events::CheckerEvent;
use crate::model::{CheckResult, ResultTally};
use crate::tabular::{ColumnMapping, Table};

/// The imported table and mapping of the current run, kept so a report can
/// be exported after the run process is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedInput {
    pub source_name: String,
    pub table: Table,
    pub mapping: ColumnMapping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub is_running: bool,
    pub total_keys: usize,
    pub processed_count: usize,
    pub current_key_preview: String,
    pub results: Vec<CheckResult>,
    /// Unix milliseconds; `None` until the first run starts.
    pub started_at: Option<i64>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub input: Option<SavedInput>,
}

impl RunState {
    /// Apply one checker event. Results only grow within a run; a `stopped`
    /// snapshot shorter than what is already recorded is ignored, so the
    /// early snapshot from `stop()` and the loop's final one can arrive in
    /// either order.
    pub fn apply(&mut self, event: &CheckerEvent, now_ms: i64) {
        match event {
            CheckerEvent::Started { total } => {
                self.is_running = true;
                self.total_keys = *total;
                self.processed_count = 0;
                self.current_key_preview.clear();
                self.results.clear();
                self.started_at = Some(now_ms);
                self.last_error = None;
            }
            CheckerEvent::Progress {
                total, current_key, ..
            } => {
                self.total_keys = *total;
                self.current_key_preview = current_key.clone();
            }
            CheckerEvent::KeyChecked { result, .. } => {
                self.results.push(result.clone());
                self.processed_count = self.results.len();
            }
            CheckerEvent::Completed { results } => {
                self.results = results.clone();
                self.processed_count = self.results.len();
                self.is_running = false;
                self.current_key_preview.clear();
            }
            CheckerEvent::Error { message } => {
                self.last_error = Some(message.clone());
                self.is_running = false;
                self.current_key_preview.clear();
            }
            CheckerEvent::Stopped { results } => {
                if results.len() >= self.results.len() {
                    self.results = results.clone();
                }
                self.processed_count = self.results.len();
                self.is_running = false;
                self.current_key_preview.clear();
            }
        }
    }

    pub fn tally(&self) -> ResultTally {
        ResultTally::from_results(&self.results)
    }

    /// Percentage of keys processed, 0 when nothing is queued.
    pub fn percent(&self) -> u8 {
        if self.total_keys == 0 {
            return 0;
        }
        let pct = self.processed_count.min(self.total_keys) * 100 / self.total_keys;
        pct as u8
    }
}
