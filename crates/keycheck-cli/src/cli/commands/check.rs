//! `keycheck check <csv>` – verify every key in a CSV file and write the report.
//!
//! This process hosts all three parts of a run: the checker task, the relay
//! task that owns and persists the Run State, and the terminal view fed by
//! the relay's broadcast. `keycheck stop` reaches it through the control socket.

use anyhow::{bail, Context, Result};
use keycheck_core::checker::{CheckSettings, Checker};
use keycheck_core::config::KeycheckConfig;
use keycheck_core::control::{default_control_socket_path, CheckerPort, CheckerSlot};
use keycheck_core::events::event_channel;
use keycheck_core::fetch::CurlFetcher;
use keycheck_core::probe::{probe_session, SessionProbe};
use keycheck_core::relay::{spawn_relay, Relay, RelayHandle, SavedInput};
use keycheck_core::store::StateStore;
use keycheck_core::tabular::{
    default_export_path, export_results, extract_keys, ColumnMapping, ExtractOptions, Table,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

use crate::cli::{control_socket, render};

const RELAY_SHUTDOWN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub csv: PathBuf,
    pub mapping: ColumnMapping,
    pub skip_checked: bool,
    pub output: Option<PathBuf>,
    pub cookie: Option<String>,
    pub har: Option<PathBuf>,
    pub skip_probe: bool,
}

pub async fn run_check(cfg: &KeycheckConfig, store: StateStore, opts: CheckOptions) -> Result<()> {
    let socket_path = default_control_socket_path()?;
    if control_socket::is_live(&socket_path).await {
        bail!("another keycheck run is in progress; use `keycheck stop` or wait for it to finish");
    }

    let table = Table::read_path(&opts.csv).with_context(|| format!("read CSV: {}", opts.csv.display()))?;
    let keys = extract_keys(
        &table,
        &opts.mapping,
        ExtractOptions {
            skip_checked: opts.skip_checked,
        },
    )?;
    if keys.is_empty() {
        println!("No keys to check in {}.", opts.csv.display());
        return Ok(());
    }
    tracing::info!(keys = keys.len(), file = %opts.csv.display(), "keys extracted");

    let cookie = super::resolve_cookie(cfg, opts.cookie.as_deref(), opts.har.as_deref())?;
    let settings = CheckSettings::from_config(cfg, cookie.as_ref().map(|c| c.value.as_str()))?;
    let fetcher = Arc::new(CurlFetcher::from_config(cfg));

    if !opts.skip_probe {
        let probe_url = Url::parse(&cfg.probe_url).with_context(|| format!("invalid probe URL: {}", cfg.probe_url))?;
        match probe_session(&fetcher, &settings.request, &probe_url).await? {
            SessionProbe::LoggedIn { .. } => {}
            SessionProbe::LoginRequired { marker } => bail!(
                "not logged in to {} (login page detected: \"{}\"); refresh the session cookie with --cookie, --har or KEYCHECK_COOKIE",
                probe_url,
                marker
            ),
            SessionProbe::Unconfirmed { score } => bail!(
                "could not confirm a logged-in session on {} ({} marker(s) found); check the cookie or pass --skip-probe",
                probe_url,
                score
            ),
        }
    }

    let (events_tx, events_rx) = event_channel();
    let checker = Checker::new(Arc::clone(&fetcher), settings, events_tx);
    let slot = Arc::new(CheckerSlot::new());
    let port: Arc<dyn CheckerPort> = Arc::new(checker.clone());
    slot.attach(port);

    let relay = Relay::restore(store, Arc::clone(&slot), cfg.state_max_age()).await?;
    let (handle, relay_task) = spawn_relay(relay, events_rx);
    let mut ui = handle.subscribe();

    let control = match control_socket::spawn_control_listener(handle.clone(), &socket_path) {
        Ok(l) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(l)
        }
        Err(e) => {
            tracing::warn!(path = %socket_path.display(), "control socket unavailable: {:#}", e);
            None
        }
    };

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if forward_interrupts(tokio::signal::ctrl_c, &handle).await {
                eprintln!("Interrupted again; exiting without waiting for the current key.");
                std::process::exit(130);
            }
        })
    };

    handle
        .save_state(SavedInput {
            source_name: opts.csv.display().to_string(),
            table: table.clone(),
            mapping: opts.mapping.clone(),
        })
        .await?;
    handle.start(keys).await?;

    loop {
        match ui.recv().await {
            Ok(event) => {
                render::print_event(&event);
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "terminal view lagged"),
            Err(RecvError::Closed) => break,
        }
    }
    checker.wait_idle().await;

    let state = handle.get_state().await?;
    interrupt.abort();
    drop(control);
    slot.detach();
    drop(handle);
    // Everything is persisted per event; this only lets queued events drain.
    let _ = tokio::time::timeout(RELAY_SHUTDOWN, relay_task).await;

    let output = opts.output.unwrap_or_else(|| default_export_path(&opts.csv));
    let report = export_results(&table, &opts.mapping, &state.results);
    report
        .write_path(&output)
        .with_context(|| format!("write report: {}", output.display()))?;

    render::print_tally(&state.tally());
    println!("Report written to {}", output.display());
    if let Some(err) = &state.last_error {
        bail!("run ended with an error: {err}");
    }
    Ok(())
}

/// First interrupt: forward a stop to the relay. Returns true when a second
/// interrupt arrives, meaning the caller should exit right away (a key can hang
/// when request timeouts are disabled).
async fn forward_interrupts<S, Fut>(mut next_signal: S, handle: &RelayHandle) -> bool
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    eprintln!("\nStopping after the current key... (Ctrl-C again to quit now)");
    if let Err(e) = handle.stop().await {
        tracing::warn!("forward stop: {:#}", e);
    }
    next_signal().await.is_ok()
}
