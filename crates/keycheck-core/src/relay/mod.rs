//! State relay: the single owner of the Run State.
//!
//! Checker events arrive on an mpsc channel, commands on another; one task
//! ([`run_relay`]) handles them one at a time, so the state has exactly one
//! writer. Every mutation is persisted and then broadcast to whoever is
//! watching. A broadcast with no subscriber is normal and ignored.

mod state;

pub use state::{RunState, SavedInput};

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::checker::CheckerError;
use crate::control::{CheckerSlot, StopOutcome};
use crate::events::{CheckerEvent, EventReceiver};
use crate::model::KeyRecord;
use crate::store::{unix_millis, StateStore};

/// UI broadcast buffer; a subscriber lagging further than this skips ahead.
const UI_CHANNEL_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

pub struct Relay {
    state: RunState,
    store: StateStore,
    slot: Arc<CheckerSlot>,
    ui: broadcast::Sender<CheckerEvent>,
}

impl Relay {
    /// Empty state, nothing restored.
    pub fn new(store: StateStore, slot: Arc<CheckerSlot>) -> Self {
        let (ui, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
        Self {
            state: RunState::default(),
            store,
            slot,
            ui,
        }
    }

    /// Start from the persisted Run State when it is younger than `max_age`,
    /// otherwise from empty state.
    pub async fn restore(store: StateStore, slot: Arc<CheckerSlot>, max_age: Duration) -> Result<Self> {
        let restored = store.load_run_state(max_age).await?;
        let mut relay = Self::new(store, slot);
        if let Some(state) = restored {
            tracing::info!(
                processed = state.processed_count,
                total = state.total_keys,
                running = state.is_running,
                "restored run state"
            );
            relay.state = state;
        }
        Ok(relay)
    }

    /// Snapshot of the current Run State. No side effects.
    pub fn state(&self) -> RunState {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckerEvent> {
        self.ui.subscribe()
    }

    pub async fn handle_event(&mut self, event: CheckerEvent) {
        tracing::trace!(kind = event.kind(), "relay event");
        self.state.apply(&event, unix_millis());
        self.persist().await;
        if self.ui.send(event).is_err() {
            tracing::trace!("no UI attached");
        }
    }

    /// Clear to empty state. Never fails; a store error is only logged.
    pub async fn reset_state(&mut self) {
        self.state = RunState::default();
        if let Err(e) = self.store.clear_run_state().await {
            tracing::warn!("failed to clear persisted run state: {:#}", e);
        }
    }

    /// Record the run's input so a report can be rebuilt later.
    pub async fn save_input(&mut self, input: SavedInput) {
        self.state.input = Some(input);
        self.persist().await;
    }

    pub fn start(&self, keys: Vec<KeyRecord>) -> Result<(), CheckerError> {
        self.slot.start(keys)
    }

    /// Forward a stop to the attached checker.
    pub fn relay_stop(&self) -> StopOutcome {
        let outcome = self.slot.stop();
        tracing::info!(outcome = outcome.as_str(), "relayed stop");
        outcome
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save_run_state(&self.state).await {
            tracing::warn!("failed to persist run state: {:#}", e);
        }
    }

    async fn handle_command(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Start { keys, reply } => {
                let _ = reply.send(self.start(keys));
            }
            RelayCommand::Stop { reply } => {
                let _ = reply.send(self.relay_stop());
            }
            RelayCommand::GetState { reply } => {
                let _ = reply.send(self.state());
            }
            RelayCommand::ResetState { reply } => {
                self.reset_state().await;
                let _ = reply.send(());
            }
            RelayCommand::SaveState { input, reply } => {
                self.save_input(input).await;
                let _ = reply.send(());
            }
        }
    }
}

/// Requests to the relay task, each with its reply channel.
#[derive(Debug)]
pub enum RelayCommand {
    Start {
        keys: Vec<KeyRecord>,
        reply: oneshot::Sender<Result<(), CheckerError>>,
    },
    Stop {
        reply: oneshot::Sender<StopOutcome>,
    },
    GetState {
        reply: oneshot::Sender<RunState>,
    },
    ResetState {
        reply: oneshot::Sender<()>,
    },
    SaveState {
        input: SavedInput,
        reply: oneshot::Sender<()>,
    },
}

/// Drive `relay` until every command sender is gone. Pending checker events
/// take precedence over commands, so a `GetState` sees everything emitted
/// before it was sent. Returns the relay for inspection.
pub async fn run_relay(
    mut relay: Relay,
    mut events: EventReceiver,
    mut commands: mpsc::Receiver<RelayCommand>,
) -> Relay {
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => relay.handle_event(event).await,
            command = commands.recv() => match command {
                Some(command) => relay.handle_command(command).await,
                None => break,
            },
        }
    }
    while let Ok(event) = events.try_recv() {
        relay.handle_event(event).await;
    }
    tracing::debug!("relay stopped");
    relay
}

/// Cloneable client for a running relay task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
    ui: broadcast::Sender<CheckerEvent>,
}

pub fn spawn_relay(relay: Relay, events: EventReceiver) -> (RelayHandle, JoinHandle<Relay>) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let handle = RelayHandle {
        tx,
        ui: relay.ui.clone(),
    };
    let task = tokio::spawn(run_relay(relay, events, rx));
    (handle, task)
}

impl RelayHandle {
    /// Live events, as forwarded after each state update.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckerEvent> {
        self.ui.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RelayCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| anyhow!("relay task is not running"))?;
        rx.await.map_err(|_| anyhow!("relay dropped the request"))
    }

    pub async fn start(&self, keys: Vec<KeyRecord>) -> Result<()> {
        self.request(|reply| RelayCommand::Start { keys, reply }).await??;
        Ok(())
    }

    pub async fn stop(&self) -> Result<StopOutcome> {
        self.request(|reply| RelayCommand::Stop { reply }).await
    }

    pub async fn get_state(&self) -> Result<RunState> {
        self.request(|reply| RelayCommand::GetState { reply }).await
    }

    pub async fn reset_state(&self) -> Result<()> {
        self.request(|reply| RelayCommand::ResetState { reply }).await
    }

    pub async fn save_state(&self, input: SavedInput) -> Result<()> {
        self.request(|reply| RelayCommand::SaveState { input, reply }).await
    }
}
