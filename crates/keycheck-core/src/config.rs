use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Randomized pause between two key checks (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Minimum pause in milliseconds.
    pub min_ms: u64,
    /// Random extra on top of `min_ms`; the pause is uniform in [min, min + span].
    pub span_ms: u64,
    /// Sleep granularity; bounds how long a stop request can go unnoticed.
    pub step_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            span_ms: 9_000,
            step_ms: 100,
        }
    }
}

/// Session credentials for the partner site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Raw `Cookie` header value of a logged-in browser session.
    #[serde(default)]
    pub cookie: Option<String>,
}

/// Global configuration loaded from `~/.config/keycheck/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycheckConfig {
    /// Per-key verification endpoint.
    pub endpoint: String,
    /// Query parameter that carries the key.
    pub query_param: String,
    /// `Referer` sent with every check.
    pub referer: String,
    /// Page fetched by the session probe before a run.
    pub probe_url: String,
    pub accept_language: String,
    pub user_agent: String,
    /// Whole-request timeout in seconds; missing or 0 disables it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
    /// Persisted run state older than this is discarded on restore.
    #[serde(default = "default_state_max_age_hours")]
    pub state_max_age_hours: u64,
    #[serde(default)]
    pub delay: DelayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_request_timeout_secs() -> Option<u64> {
    Some(30)
}

fn default_state_max_age_hours() -> u64 {
    24
}

impl Default for KeycheckConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://partner.steamgames.com/querycdkey/cdkey".to_string(),
            query_param: "cdkey".to_string(),
            referer: "https://partner.steamgames.com/querycdkey/".to_string(),
            probe_url: "https://partner.steamgames.com/querycdkey/".to_string(),
            accept_language: "fr-FR,fr;q=0.8,en-US;q=0.5,en;q=0.3".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
            request_timeout_secs: default_request_timeout_secs(),
            state_max_age_hours: default_state_max_age_hours(),
            delay: DelayConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl KeycheckConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn state_max_age(&self) -> Duration {
        Duration::from_secs(self.state_max_age_hours.saturating_mul(3600))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("keycheck")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<KeycheckConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<KeycheckConfig> {
    if !path.exists() {
        let default_cfg = KeycheckConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: KeycheckConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
