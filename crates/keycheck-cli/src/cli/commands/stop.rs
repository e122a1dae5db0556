//! `keycheck stop` – ask the running `keycheck check` to stop.

use anyhow::Result;
use keycheck_core::control::default_control_socket_path;

use crate::cli::control_socket;

pub async fn run_stop() -> Result<()> {
    let path = default_control_socket_path()?;
    match control_socket::send_stop(&path).await?.as_deref() {
        Some("stopped") => println!("Stop requested."),
        Some(_) => println!("The run had already finished."),
        None => println!("No keycheck run is active."),
    }
    Ok(())
}
