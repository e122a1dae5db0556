//! libcurl-backed fetcher. Each GET runs on the blocking pool.

use async_trait::async_trait;
use std::str;
use std::time::Duration;

use crate::config::KeycheckConfig;

use super::{CheckRequest, FetchError, PageFetcher, PageResponse};

#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    /// Whole-request timeout; `None` lets a stalled page hang that key.
    pub timeout: Option<Duration>,
}

impl CurlFetcher {
    pub fn from_config(cfg: &KeycheckConfig) -> Self {
        Self {
            timeout: cfg.request_timeout(),
        }
    }
}

#[async_trait]
impl PageFetcher for CurlFetcher {
    async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError> {
        let request = request.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || fetch_blocking(&request, timeout))
            .await
            .map_err(|e| FetchError::Join(e.to_string()))?
    }
}

fn fetch_blocking(request: &CheckRequest, timeout: Option<Duration>) -> Result<PageResponse, FetchError> {
    let mut body: Vec<u8> = Vec::new();
    let mut status_line: Option<String> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(request.url.as_str())?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    // Empty string = every encoding libcurl was built with (gzip, deflate, br).
    easy.accept_encoding("")?;
    easy.connect_timeout(Duration::from_secs(15))?;
    if let Some(t) = timeout {
        easy.timeout(t)?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                // Redirects produce several status lines; keep the last.
                if s.starts_with("HTTP/") {
                    status_line = Some(s.trim_end().to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    let reason = status_line.as_deref().map(reason_phrase).unwrap_or_default();
    tracing::trace!(url = %request.url, status, bytes = body.len(), "GET finished");
    Ok(PageResponse {
        status,
        reason,
        body,
    })
}

/// "HTTP/1.1 404 Not Found" -> "Not Found"; HTTP/2 lines carry no phrase.
fn reason_phrase(line: &str) -> String {
    line.splitn(3, ' ').nth(2).unwrap_or("").trim().to_string()
}
