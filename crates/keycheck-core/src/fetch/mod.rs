//! Per-key HTTP request building and the fetch capability the checker consumes.
//!
//! The checker never talks to the network directly; it builds a
//! [`CheckRequest`] from the [`RequestTemplate`] and hands it to a
//! [`PageFetcher`]. Production uses [`CurlFetcher`]; tests inject stubs.

mod curl_fetch;
mod error;
mod request;

pub use curl_fetch::CurlFetcher;
pub use error::FetchError;
pub use request::{CheckRequest, RequestTemplate};

use async_trait::async_trait;

/// Raw response of one GET: status, reason phrase, undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u32,
    pub reason: String,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as text (lossy; the partner page is UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// "404 Not Found" style summary for error details.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }
}

/// Capability to perform one authenticated GET.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<T> {
    async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError> {
        (**self).fetch(request).await
    }
}
