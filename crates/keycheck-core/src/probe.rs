//! Session probe: fetch the query page once and decide whether the session
//! cookie is logged in, before spending a whole run on login pages.

use anyhow::{bail, Result};
use url::Url;

use crate::fetch::{PageFetcher, RequestTemplate};

/// Present on the query page of a logged-in partner account.
const LOGGED_IN_MARKERS: &[&str] = &[
    "queryform",
    "name=\"cdkey\"",
    "tableau de bord",
    "partner dashboard",
    "déconnexion",
    "logout",
    "mon compte",
    "my account",
];

/// Present on the login page shown to anonymous sessions.
const LOGIN_MARKERS: &[&str] = &[
    "se connecter",
    "sign in",
    "g_showlogindialog",
    "create account",
    "forgotten password",
    "mot de passe oublié",
];

/// Logged-in markers needed before negative markers are ignored.
const LOGGED_IN_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionProbe {
    LoggedIn { score: usize },
    LoginRequired { marker: &'static str },
    /// Neither enough logged-in markers nor any login marker.
    Unconfirmed { score: usize },
}

impl SessionProbe {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionProbe::LoggedIn { .. })
    }
}

pub fn assess_login(html: &str) -> SessionProbe {
    let lower = html.to_lowercase();
    let score = LOGGED_IN_MARKERS
        .iter()
        .filter(|m| lower.contains(*m))
        .count();
    if score >= LOGGED_IN_THRESHOLD {
        return SessionProbe::LoggedIn { score };
    }
    if let Some(marker) = LOGIN_MARKERS.iter().copied().find(|m| lower.contains(m)) {
        return SessionProbe::LoginRequired { marker };
    }
    SessionProbe::Unconfirmed { score }
}

/// GET `probe_url` with the session headers and assess the page.
pub async fn probe_session<F>(fetcher: &F, template: &RequestTemplate, probe_url: &Url) -> Result<SessionProbe>
where
    F: PageFetcher + ?Sized,
{
    let request = template.for_page(probe_url.clone());
    let response = fetcher.fetch(&request).await?;
    if !response.is_success() {
        bail!("session probe got HTTP {} from {}", response.status_line(), probe_url);
    }
    let probe = assess_login(&response.text());
    tracing::info!(url = %probe_url, result = ?probe, "session probe");
    Ok(probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeycheckConfig;
    use crate::fetch::{CheckRequest, FetchError, PageResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OnePage {
        status: u32,
        html: &'static str,
        seen: Mutex<Vec<CheckRequest>>,
    }

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(PageResponse {
                status: self.status,
                reason: String::new(),
                body: self.html.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn two_markers_mean_logged_in() {
        let html = r#"<form id="queryForm"><input name="cdkey"></form><a>Logout</a>"#;
        assert_eq!(assess_login(html), SessionProbe::LoggedIn { score: 3 });
    }

    #[test]
    fn logged_in_score_beats_incidental_sign_in_text() {
        let html = r#"<div>Partner Dashboard</div><a>My Account</a><p>sign in with another account</p>"#;
        assert!(assess_login(html).is_logged_in());
    }

    #[test]
    fn login_page_is_detected() {
        let html = r#"<button onclick="g_ShowLoginDialog()">Se connecter</button>"#;
        assert_eq!(
            assess_login(html),
            SessionProbe::LoginRequired { marker: "se connecter" }
        );
    }

    #[test]
    fn single_marker_is_unconfirmed() {
        assert_eq!(
            assess_login("<a>logout</a>"),
            SessionProbe::Unconfirmed { score: 1 }
        );
    }

    #[tokio::test]
    async fn probe_sends_session_headers() {
        let fetcher = OnePage {
            status: 200,
            html: r#"<form id="queryform"><input name="cdkey"></form>"#,
            seen: Mutex::new(Vec::new()),
        };
        let cfg = KeycheckConfig::default();
        let template = RequestTemplate::from_config(&cfg, Some("sessionid=abc")).unwrap();
        let url = Url::parse(&cfg.probe_url).unwrap();
        let probe = probe_session(&fetcher, &template, &url).await.unwrap();
        assert!(probe.is_logged_in());
        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen[0].url, url);
        assert_eq!(seen[0].header("Cookie"), Some("sessionid=abc"));
    }

    #[tokio::test]
    async fn probe_http_error_is_reported() {
        let fetcher = OnePage {
            status: 503,
            html: "",
            seen: Mutex::new(Vec::new()),
        };
        let cfg = KeycheckConfig::default();
        let template = RequestTemplate::from_config(&cfg, None).unwrap();
        let url = Url::parse(&cfg.probe_url).unwrap();
        let err = probe_session(&fetcher, &template, &url).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
