//! Closed set of verification outcomes, stored and exported by display label.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "Activated")]
    Activated,
    #[serde(rename = "Not activated")]
    NotActivated,
    #[serde(rename = "Invalid")]
    Invalid,
    #[serde(rename = "Not found")]
    NotFound,
    #[serde(rename = "Unknown status")]
    UnknownStatus,
    #[serde(rename = "Error")]
    Error,
    #[serde(rename = "Stopped")]
    Stopped,
}

impl StatusCode {
    pub const ALL: [StatusCode; 7] = [
        StatusCode::Activated,
        StatusCode::NotActivated,
        StatusCode::Invalid,
        StatusCode::NotFound,
        StatusCode::UnknownStatus,
        StatusCode::Error,
        StatusCode::Stopped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Activated => "Activated",
            StatusCode::NotActivated => "Not activated",
            StatusCode::Invalid => "Invalid",
            StatusCode::NotFound => "Not found",
            StatusCode::UnknownStatus => "Unknown status",
            StatusCode::Error => "Error",
            StatusCode::Stopped => "Stopped",
        }
    }

    /// Parse a display label back into a status (e.g. from an exported report).
    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
