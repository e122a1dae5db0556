//! Session credentials: where the Cookie header for the partner site comes from.
//!
//! Priority: explicit `--cookie`, then a HAR capture of the logged-in browser,
//! then `KEYCHECK_COOKIE`, then `session.cookie` from the config file.

mod har;

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use url::Url;

use self::har::HarLog;

pub const COOKIE_ENV: &str = "KEYCHECK_COOKIE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSource {
    Flag,
    Har,
    Env,
    Config,
}

impl fmt::Display for CookieSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CookieSource::Flag => "--cookie",
            CookieSource::Har => "HAR file",
            CookieSource::Env => COOKIE_ENV,
            CookieSource::Config => "config session.cookie",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub value: String,
    pub source: CookieSource,
}

/// Inputs to cookie resolution, highest priority first.
#[derive(Debug, Default, Clone, Copy)]
pub struct CookieInputs<'a> {
    pub flag: Option<&'a str>,
    pub har: Option<&'a Path>,
    pub env: Option<&'a str>,
    pub config: Option<&'a str>,
}

/// Cookie header of the last request to `host` recorded in a HAR file.
pub fn cookie_from_har(path: &Path, host: &str) -> Result<Option<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("read HAR file: {}", path.display()))?;
    let har: HarLog = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse HAR JSON: {}", path.display()))?;
    let cookie = har
        .log
        .entries
        .iter()
        .rev()
        .filter(|e| {
            Url::parse(&e.request.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
                .unwrap_or(false)
        })
        .find_map(|e| e.request.cookie());
    Ok(cookie)
}

/// First non-empty cookie among the inputs. A HAR file that is given but holds
/// no cookie for `host` is an error rather than a silent fallthrough.
pub fn resolve_cookie(inputs: CookieInputs<'_>, host: &str) -> Result<Option<SessionCookie>> {
    fn non_empty(v: Option<&str>) -> Option<String> {
        v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
    }

    if let Some(value) = non_empty(inputs.flag) {
        return Ok(Some(SessionCookie {
            value,
            source: CookieSource::Flag,
        }));
    }
    if let Some(path) = inputs.har {
        let value = cookie_from_har(path, host)?
            .ok_or_else(|| anyhow::anyhow!("no Cookie header for {} in {}", host, path.display()))?;
        return Ok(Some(SessionCookie {
            value,
            source: CookieSource::Har,
        }));
    }
    if let Some(value) = non_empty(inputs.env) {
        return Ok(Some(SessionCookie {
            value,
            source: CookieSource::Env,
        }));
    }
    Ok(non_empty(inputs.config).map(|value| SessionCookie {
        value,
        source: CookieSource::Config,
    }))
}

/// Value of `KEYCHECK_COOKIE`, if set.
pub fn cookie_from_env() -> Option<String> {
    std::env::var(COOKIE_ENV).ok()
}
