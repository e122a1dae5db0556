//! `keycheck reset` – clear the persisted Run State.

use anyhow::Result;
use keycheck_core::control::{default_control_socket_path, CheckerSlot};
use keycheck_core::relay::Relay;
use keycheck_core::store::StateStore;
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_reset(store: StateStore) -> Result<()> {
    if let Ok(path) = default_control_socket_path() {
        if control_socket::is_live(&path).await {
            println!("Note: a run is still active; it will keep recording its progress.");
        }
    }
    let mut relay = Relay::new(store, Arc::new(CheckerSlot::new()));
    relay.reset_state().await;
    println!("Run state cleared.");
    Ok(())
}
