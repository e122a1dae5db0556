//! Status classification of the query page HTML.
//!
//! Two tiers, first hit wins:
//! 1. every `span` with an inline `color` style, in document order; per
//!    span the not-activated markers are tested before the activated ones.
//!    Colored containers are skipped: their text covers legends and help
//!    paragraphs as well as the status itself;
//! 2. the lower-cased body text against a fixed phrase order.
//!
//! "activated" is a substring of "not activated", so the order is load-bearing.

mod patterns;

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::model::StatusCode;

use self::patterns::{
    compact_style, ACTIVATED_COLORS, ACTIVATED_TEXT, FALLBACK_ORDER, NOT_ACTIVATED_COLORS,
    NOT_ACTIVATED_TEXT,
};

fn styled_selector() -> Option<&'static Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR
        .get_or_init(|| Selector::parse(r#"span[style*="color"]"#).ok())
        .as_ref()
}

fn body_selector() -> Option<&'static Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("body").ok()).as_ref()
}

/// Classify a query page response.
pub fn classify_html(html: &str) -> StatusCode {
    let document = Html::parse_document(html);
    if let Some(status) = scan_styled_elements(&document) {
        return status;
    }
    scan_full_text(&document)
}

fn scan_styled_elements(document: &Html) -> Option<StatusCode> {
    let selector = styled_selector()?;
    for element in document.select(selector) {
        let text = element_text(element).trim().to_lowercase();
        let style = compact_style(element.value().attr("style").unwrap_or_default());
        if let Some(status) = classify_element(&text, &style) {
            tracing::trace!(%text, %style, %status, "styled element matched");
            return Some(status);
        }
    }
    None
}

/// Classify one styled element. `text` is lower-cased, `style` compacted.
fn classify_element(text: &str, style: &str) -> Option<StatusCode> {
    let has = |needles: &[&str], haystack: &str| needles.iter().any(|n| haystack.contains(n));

    if has(NOT_ACTIVATED_TEXT, text) || has(NOT_ACTIVATED_COLORS, style) {
        return Some(StatusCode::NotActivated);
    }
    if has(ACTIVATED_TEXT, text) || has(ACTIVATED_COLORS, style) {
        return Some(StatusCode::Activated);
    }
    None
}

fn scan_full_text(document: &Html) -> StatusCode {
    let text = match body_selector().and_then(|s| document.select(s).next()) {
        Some(body) => element_text(body),
        None => element_text(document.root_element()),
    };
    let lower = text.to_lowercase();
    FALLBACK_ORDER
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, status)| *status)
        .unwrap_or(StatusCode::UnknownStatus)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}
