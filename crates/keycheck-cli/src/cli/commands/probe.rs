//! `keycheck probe` – check that the session cookie is logged in.

use anyhow::{bail, Context, Result};
use keycheck_core::config::KeycheckConfig;
use keycheck_core::fetch::{CurlFetcher, RequestTemplate};
use keycheck_core::probe::{probe_session, SessionProbe};
use std::path::Path;
use url::Url;

pub async fn run_probe(cfg: &KeycheckConfig, cookie: Option<&str>, har: Option<&Path>) -> Result<()> {
    let cookie = super::resolve_cookie(cfg, cookie, har)?;
    if let Some(c) = &cookie {
        println!("Cookie source: {}", c.source);
    }
    let template = RequestTemplate::from_config(cfg, cookie.as_ref().map(|c| c.value.as_str()))?;
    let url = Url::parse(&cfg.probe_url).with_context(|| format!("invalid probe URL: {}", cfg.probe_url))?;
    let fetcher = CurlFetcher::from_config(cfg);
    match probe_session(&fetcher, &template, &url).await? {
        SessionProbe::LoggedIn { score } => {
            println!("Logged in ({score} marker(s) on {url}).");
            Ok(())
        }
        SessionProbe::LoginRequired { marker } => {
            bail!("login required: the page shows \"{marker}\"; refresh the session cookie")
        }
        SessionProbe::Unconfirmed { score } => {
            bail!("could not confirm login ({score} marker(s) found on {url})")
        }
    }
}
