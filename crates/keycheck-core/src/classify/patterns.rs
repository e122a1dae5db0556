//! Fixed markers of the partner query page, in French and English.
//!
//! Colors are stored without whitespace; styles are compacted the same way
//! before matching so `rgb(226, 64, 68)` and `rgb(226,64,68)` compare equal.

use crate::model::StatusCode;

pub(super) const NOT_ACTIVATED_TEXT: &[&str] = &["non activée", "not activated"];
pub(super) const NOT_ACTIVATED_COLORS: &[&str] = &["#e24044", "rgb(226,64,68)"];

pub(super) const ACTIVATED_TEXT: &[&str] = &["activée", "activated"];
pub(super) const ACTIVATED_COLORS: &[&str] = &["#67c1f5", "rgb(103,193,245)"];

/// Full-text fallback, first match wins. Negated phrases come before the
/// phrases they contain.
pub(super) const FALLBACK_ORDER: &[(&str, StatusCode)] = &[
    ("non activée", StatusCode::NotActivated),
    ("not activated", StatusCode::NotActivated),
    ("activée", StatusCode::Activated),
    ("activated", StatusCode::Activated),
    ("invalid", StatusCode::Invalid),
    ("invalide", StatusCode::Invalid),
    ("not found", StatusCode::NotFound),
    ("introuvable", StatusCode::NotFound),
];

pub(super) fn compact_style(style: &str) -> String {
    style
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
