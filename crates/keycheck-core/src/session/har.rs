//! Minimal HAR 1.2 structures: just enough to pull the session cookie a
//! logged-in browser sent to the partner site.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HarLog {
    pub log: HarRoot,
}

#[derive(Debug, Deserialize)]
pub struct HarRoot {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HarEntry {
    pub request: HarRequest,
}

#[derive(Debug, Deserialize)]
pub struct HarRequest {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HarPair>,
    #[serde(default)]
    pub cookies: Vec<HarPair>,
}

#[derive(Debug, Deserialize)]
pub struct HarPair {
    pub name: String,
    pub value: String,
}

impl HarRequest {
    /// Cookie header as sent, or one rebuilt from the `cookies` array.
    pub fn cookie(&self) -> Option<String> {
        let header = self
            .headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case("cookie"))
            .map(|h| h.value.trim())
            .find(|v| !v.is_empty());
        if let Some(v) = header {
            return Some(v.to_string());
        }
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }
}
