//! The one fixed request shape: GET endpoint?<param>=<key> with browser-like headers.

use anyhow::{Context, Result};
use url::Url;

use crate::config::KeycheckConfig;

/// A fully built GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl CheckRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Endpoint, key parameter, and the header set shared by every check.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    endpoint: Url,
    query_param: String,
    headers: Vec<(String, String)>,
}

impl RequestTemplate {
    /// Build from config. `cookie` carries the logged-in session; without it
    /// the partner site answers with its login page.
    pub fn from_config(cfg: &KeycheckConfig, cookie: Option<&str>) -> Result<Self> {
        let endpoint = Url::parse(&cfg.endpoint)
            .with_context(|| format!("invalid endpoint URL: {}", cfg.endpoint))?;
        let mut headers = vec![
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), cfg.accept_language.clone()),
            ("Referer".to_string(), cfg.referer.clone()),
            ("User-Agent".to_string(), cfg.user_agent.clone()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
        ];
        if let Some(cookie) = cookie.map(str::trim).filter(|c| !c.is_empty()) {
            headers.push(("Cookie".to_string(), cookie.to_string()));
        }
        Ok(Self {
            endpoint,
            query_param: cfg.query_param.clone(),
            headers,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// GET request for one key; the key is percent-encoded into the query.
    pub fn for_key(&self, key: &str) -> CheckRequest {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair(&self.query_param, key);
        CheckRequest {
            url,
            headers: self.headers.clone(),
        }
    }

    /// GET request for an arbitrary page with the same session headers (probe).
    pub fn for_page(&self, url: Url) -> CheckRequest {
        CheckRequest {
            url,
            headers: self.headers.clone(),
        }
    }
}
