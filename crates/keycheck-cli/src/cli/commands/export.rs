//! `keycheck export` – rebuild the report from the persisted Run State.

use anyhow::{Context, Result};
use keycheck_core::config::KeycheckConfig;
use keycheck_core::control::CheckerSlot;
use keycheck_core::relay::Relay;
use keycheck_core::store::StateStore;
use keycheck_core::tabular::{default_export_path, export_results};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::render;

pub async fn run_export(cfg: &KeycheckConfig, store: StateStore, output: Option<PathBuf>) -> Result<()> {
    let relay = Relay::restore(store, Arc::new(CheckerSlot::new()), cfg.state_max_age()).await?;
    let state = relay.state();
    let input = state
        .input
        .as_ref()
        .context("no saved run to export; run `keycheck check <csv>` first")?;

    let output = output.unwrap_or_else(|| default_export_path(Path::new(&input.source_name)));
    let report = export_results(&input.table, &input.mapping, &state.results);
    report
        .write_path(&output)
        .with_context(|| format!("write report: {}", output.display()))?;

    if state.is_running {
        println!("Note: the run is not finished; unchecked keys have an empty status.");
    }
    render::print_tally(&state.tally());
    println!("Report written to {}", output.display());
    Ok(())
}
