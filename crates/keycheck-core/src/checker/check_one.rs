//! One key: build the request, send it, classify the page. Never fails;
//! every problem becomes an `Error` verdict, a noticed stop becomes `Stopped`.

use std::panic::{self, AssertUnwindSafe};
use tokio_util::sync::CancellationToken;

use crate::classify::classify_html;
use crate::fetch::{PageFetcher, RequestTemplate};
use crate::model::KeyVerdict;

use super::panic_message;

pub async fn check_one<F>(
    fetcher: &F,
    template: &RequestTemplate,
    key: &str,
    cancel: &CancellationToken,
) -> KeyVerdict
where
    F: PageFetcher + ?Sized,
{
    if cancel.is_cancelled() {
        return KeyVerdict::stopped();
    }
    let request = template.for_key(key);

    if cancel.is_cancelled() {
        return KeyVerdict::stopped();
    }
    let response = match fetcher.fetch(&request).await {
        Ok(r) => r,
        Err(e) if cancel.is_cancelled() => {
            tracing::debug!(url = %request.url, "request failed after stop: {}", e);
            return KeyVerdict::stopped();
        }
        Err(e) => {
            tracing::warn!(url = %request.url, "key check request failed: {}", e);
            return KeyVerdict::error(e.to_string());
        }
    };

    if cancel.is_cancelled() {
        return KeyVerdict::stopped();
    }
    if !response.is_success() {
        return KeyVerdict::error(format!("HTTP error: {}", response.status_line()));
    }

    let html = response.text();
    tracing::trace!(bytes = html.len(), "classifying response");
    match panic::catch_unwind(AssertUnwindSafe(|| classify_html(&html))) {
        Ok(status) => KeyVerdict::status(status),
        Err(payload) => KeyVerdict::error(format!("parse error: {}", panic_message(payload.as_ref()))),
    }
}
