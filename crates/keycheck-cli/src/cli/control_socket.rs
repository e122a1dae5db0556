//! Control socket: server (during `keycheck check`) and client (for `keycheck stop`).
//! Protocol: one line per command, one line back. "stop" answers "stopped"
//! or "no-checker"; "ping" answers "pong".

use anyhow::Result;
use keycheck_core::relay::RelayHandle;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// Listener task plus the socket file it owns; the file is removed on drop.
pub struct ControlListener {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Binds `path` and serves commands against `relay`. Fails if the socket
/// cannot be bound (e.g. the state dir is unwritable).
pub fn spawn_control_listener(relay: RelayHandle, path: impl AsRef<Path>) -> Result<ControlListener> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let relay = relay.clone();
                    tokio::spawn(serve(stream, relay));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(ControlListener { path, task })
}

async fn serve(stream: UnixStream, relay: RelayHandle) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match line.trim() {
            "stop" => match relay.stop().await {
                Ok(outcome) => outcome.as_str().to_string(),
                Err(e) => {
                    tracing::warn!("control stop: {:#}", e);
                    "no-checker".to_string()
                }
            },
            "ping" => "pong".to_string(),
            other => {
                tracing::debug!(command = other, "unknown control command");
                continue;
            }
        };
        if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Send one command and read the reply line. `None` if nobody is listening
/// (no socket file, or a stale one left by a crashed process).
async fn request(socket_path: &Path, command: &str) -> Result<Option<String>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "control socket connect: {}", e);
            return Ok(None);
        }
    };
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{command}\n").as_bytes()).await?;
    let reply = BufReader::new(read).lines().next_line().await?;
    Ok(reply.map(|r| r.trim().to_string()))
}

pub async fn send_stop(socket_path: &Path) -> Result<Option<String>> {
    request(socket_path, "stop").await
}

/// True when a `keycheck check` process answers on the socket.
pub async fn is_live(socket_path: &Path) -> bool {
    matches!(request(socket_path, "ping").await, Ok(Some(r)) if r == "pong")
}
