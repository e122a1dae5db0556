//! CLI command handlers. Each command is in its own file.

mod check;
mod export;
mod probe;
mod reset;
mod status;
mod stop;

pub use check::{run_check, CheckOptions};
pub use export::run_export;
pub use probe::run_probe;
pub use reset::run_reset;
pub use status::run_status;
pub use stop::run_stop;

use anyhow::{Context, Result};
use keycheck_core::config::KeycheckConfig;
use keycheck_core::session::{self, CookieInputs, SessionCookie};
use std::path::Path;
use url::Url;

/// Resolve the session cookie from flags, env and config for the endpoint host.
fn resolve_cookie(cfg: &KeycheckConfig, flag: Option<&str>, har: Option<&Path>) -> Result<Option<SessionCookie>> {
    let endpoint = Url::parse(&cfg.endpoint).with_context(|| format!("invalid endpoint URL: {}", cfg.endpoint))?;
    let host = endpoint.host_str().unwrap_or_default();
    let env = session::cookie_from_env();
    let cookie = session::resolve_cookie(
        CookieInputs {
            flag,
            har,
            env: env.as_deref(),
            config: cfg.session.cookie.as_deref(),
        },
        host,
    )?;
    match &cookie {
        Some(c) => tracing::info!(source = %c.source, "using session cookie"),
        None => tracing::warn!("no session cookie configured"),
    }
    Ok(cookie)
}
