//! Run State persistence under the well-known `run_state` key.

use anyhow::Result;
use std::time::Duration;

use super::{unix_millis, StateStore};
use crate::relay::RunState;

pub const RUN_STATE_KEY: &str = "run_state";

impl StateStore {
    pub async fn save_run_state(&self, state: &RunState) -> Result<()> {
        self.save_run_state_at(state, unix_millis()).await
    }

    pub(crate) async fn save_run_state_at(&self, state: &RunState, updated_at: i64) -> Result<()> {
        self.put_json(RUN_STATE_KEY, state, updated_at).await
    }

    /// Load the persisted Run State if it was written less than `max_age` ago.
    /// Stale or undecodable records are deleted and reported as absent.
    pub async fn load_run_state(&self, max_age: Duration) -> Result<Option<RunState>> {
        let stored = match self.get_json::<RunState>(RUN_STATE_KEY).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("discarding unreadable run state: {:#}", e);
                self.delete(RUN_STATE_KEY).await?;
                return Ok(None);
            }
        };
        let age_ms = unix_millis().saturating_sub(stored.updated_at);
        let max_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        if age_ms >= max_ms {
            tracing::info!(age_ms, "discarding stale run state");
            self.delete(RUN_STATE_KEY).await?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    pub async fn clear_run_state(&self) -> Result<()> {
        self.delete(RUN_STATE_KEY).await?;
        Ok(())
    }
}
