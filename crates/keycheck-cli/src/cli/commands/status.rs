//! `keycheck status` – show the persisted Run State, from any terminal.

use anyhow::Result;
use keycheck_core::config::KeycheckConfig;
use keycheck_core::control::{default_control_socket_path, CheckerSlot};
use keycheck_core::relay::Relay;
use keycheck_core::store::StateStore;
use std::sync::Arc;

use crate::cli::{control_socket, render};

pub async fn run_status(cfg: &KeycheckConfig, store: StateStore) -> Result<()> {
    let relay = Relay::restore(store, Arc::new(CheckerSlot::new()), cfg.state_max_age()).await?;
    let state = relay.state();
    if state.started_at.is_none() && state.input.is_none() {
        println!("No run recorded.");
        return Ok(());
    }
    let live = match default_control_socket_path() {
        Ok(path) => control_socket::is_live(&path).await,
        Err(_) => false,
    };
    render::print_state(&state, live);
    Ok(())
}
