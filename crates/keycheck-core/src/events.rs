//! Lifecycle events emitted by the checker and relayed to observers.
//!
//! Serialized as a tagged union (`{"type": "keyChecked", ...}`) so the same
//! shape can cross a process boundary unchanged.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::CheckResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CheckerEvent {
    Started {
        total: usize,
    },
    /// Emitted before the network call for key `current` (1-based).
    Progress {
        current: usize,
        total: usize,
        #[serde(rename = "currentKey")]
        current_key: String,
    },
    KeyChecked {
        index: usize,
        result: CheckResult,
    },
    Completed {
        results: Vec<CheckResult>,
    },
    Error {
        message: String,
    },
    Stopped {
        results: Vec<CheckResult>,
    },
}

impl CheckerEvent {
    /// True for events that end a run (completed, error, stopped).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckerEvent::Completed { .. } | CheckerEvent::Error { .. } | CheckerEvent::Stopped { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CheckerEvent::Started { .. } => "started",
            CheckerEvent::Progress { .. } => "progress",
            CheckerEvent::KeyChecked { .. } => "keyChecked",
            CheckerEvent::Completed { .. } => "completed",
            CheckerEvent::Error { .. } => "error",
            CheckerEvent::Stopped { .. } => "stopped",
        }
    }
}

/// Sending half used by the checker. Unbounded so emitting never waits on observers.
pub type EventSender = mpsc::UnboundedSender<CheckerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<CheckerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
