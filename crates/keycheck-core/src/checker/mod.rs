//! The verification loop.
//!
//! Keys are checked strictly one at a time, in input order, with a randomized
//! pause between checks. Each run emits `started`, then per key `progress`
//! (before the request) and `keyChecked`, and the loop itself ends with exactly
//! one of `completed`, `stopped` or `error`.
//!
//! Cancellation is cooperative: [`Checker::stop`] cancels the run's token and
//! the loop notices it before building a request, before sending it, before
//! reading the body, and between sleep steps. An in-flight request is allowed
//! to finish; its result is replaced by a `Stopped` record. `stop` emits its
//! own `stopped` snapshot right away, so observers can see two of them.

mod check_one;
mod delay;
mod guard;

pub use check_one::check_one;
pub use delay::{sleep_cancellable, DelayPolicy};

use anyhow::Result;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::KeycheckConfig;
use crate::control::CheckerPort;
use crate::events::{CheckerEvent, EventSender};
use crate::fetch::{PageFetcher, RequestTemplate};
use crate::model::{CheckResult, KeyRecord, StatusCode};

use self::guard::RunGuard;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckerError {
    #[error("a verification run is already in progress")]
    Busy,
    #[error("no checker is attached to this keycheck process")]
    NotAttached,
}

/// Everything a run needs besides the fetcher.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub request: RequestTemplate,
    pub delay: DelayPolicy,
}

impl CheckSettings {
    pub fn from_config(cfg: &KeycheckConfig, cookie: Option<&str>) -> Result<Self> {
        Ok(Self {
            request: RequestTemplate::from_config(cfg, cookie)?,
            delay: DelayPolicy::from_config(&cfg.delay),
        })
    }
}

/// How a run ended, as returned to a caller awaiting [`Checker::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Vec<CheckResult>),
    Stopped(Vec<CheckResult>),
    Failed {
        message: String,
        partial: Vec<CheckResult>,
    },
}

impl RunOutcome {
    pub fn results(&self) -> &[CheckResult] {
        match self {
            RunOutcome::Completed(r) | RunOutcome::Stopped(r) => r,
            RunOutcome::Failed { partial, .. } => partial,
        }
    }
}

enum LoopExit {
    Finished,
    Cancelled,
}

/// Cheap to clone; clones share the same run state.
pub struct Checker<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for Checker<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<F> {
    fetcher: F,
    settings: CheckSettings,
    events: EventSender,
    running: Arc<watch::Sender<bool>>,
    cancel: Mutex<CancellationToken>,
    results: Mutex<Vec<CheckResult>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<F: PageFetcher> Checker<F> {
    pub fn new(fetcher: F, settings: CheckSettings, events: EventSender) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                settings,
                events,
                running: Arc::new(running),
                cancel: Mutex::new(CancellationToken::new()),
                results: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// Resolves once no run is active (immediately if idle).
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Results accumulated by the current (or last) run.
    pub fn results(&self) -> Vec<CheckResult> {
        self.inner.results()
    }

    /// Run the loop to completion on the current task.
    ///
    /// Fails fast with [`CheckerError::Busy`] if a run is active; in that case
    /// nothing is emitted and the active run is untouched.
    pub async fn run(&self, keys: Vec<KeyRecord>) -> Result<RunOutcome, CheckerError> {
        let guard = self.inner.begin()?;
        Ok(self.inner.drive(guard, keys).await)
    }

    /// Request a stop. Emits `stopped` with the results so far and returns
    /// true if a run was active; returns false (and emits nothing) otherwise.
    pub fn stop(&self) -> bool {
        let cancel = lock(&self.inner.cancel);
        if !self.is_running() {
            return false;
        }
        cancel.cancel();
        drop(cancel);
        let results = self.inner.results();
        tracing::info!(checked = results.len(), "stop requested");
        self.inner.emit(CheckerEvent::Stopped { results });
        true
    }
}

impl<F: PageFetcher + 'static> CheckerPort for Checker<F> {
    fn start(&self, keys: Vec<KeyRecord>) -> Result<(), CheckerError> {
        let guard = self.inner.begin()?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive(guard, keys).await;
        });
        Ok(())
    }

    fn stop(&self) -> bool {
        Checker::stop(self)
    }
}

impl<F: PageFetcher> Inner<F> {
    fn results(&self) -> Vec<CheckResult> {
        lock(&self.results).clone()
    }

    fn emit(&self, event: CheckerEvent) {
        let kind = event.kind();
        if self.events.send(event).is_err() {
            tracing::debug!(kind, "no event listener attached; event dropped");
        }
    }

    /// Take the busy guard and reset per-run state under the cancel lock, so a
    /// concurrent `stop` sees either the old run or the new one, never a mix.
    fn begin(&self) -> Result<RunGuard, CheckerError> {
        let mut cancel = lock(&self.cancel);
        let guard = RunGuard::acquire(&self.running).ok_or(CheckerError::Busy)?;
        *cancel = CancellationToken::new();
        lock(&self.results).clear();
        Ok(guard)
    }

    async fn drive(&self, guard: RunGuard, keys: Vec<KeyRecord>) -> RunOutcome {
        let cancel = lock(&self.cancel).clone();
        let total = keys.len();
        tracing::info!(total, "key check run started");
        self.emit(CheckerEvent::Started { total });

        let exit = AssertUnwindSafe(self.check_all(&keys, &cancel))
            .catch_unwind()
            .await;
        let results = self.results();
        let outcome = match exit {
            Ok(LoopExit::Finished) => {
                tracing::info!(checked = results.len(), "key check run completed");
                self.emit(CheckerEvent::Completed {
                    results: results.clone(),
                });
                RunOutcome::Completed(results)
            }
            Ok(LoopExit::Cancelled) => {
                tracing::info!(checked = results.len(), total, "key check run stopped");
                self.emit(CheckerEvent::Stopped {
                    results: results.clone(),
                });
                RunOutcome::Stopped(results)
            }
            Err(payload) => {
                let message = format!("verification loop failed: {}", panic_message(payload.as_ref()));
                tracing::error!(checked = results.len(), "{}", message);
                self.emit(CheckerEvent::Error {
                    message: message.clone(),
                });
                RunOutcome::Failed {
                    message,
                    partial: results,
                }
            }
        };
        drop(guard);
        outcome
    }

    async fn check_all(&self, keys: &[KeyRecord], cancel: &CancellationToken) -> LoopExit {
        let total = keys.len();
        for (index, key) in keys.iter().enumerate() {
            if cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }
            let preview = key.preview();
            tracing::debug!("[{}/{}] checking {} ({})", index + 1, total, preview, key.source_column);
            self.emit(CheckerEvent::Progress {
                current: index + 1,
                total,
                current_key: preview,
            });

            let verdict = check_one(&self.fetcher, &self.settings.request, &key.value, cancel).await;
            let stopped = verdict.status == StatusCode::Stopped;
            let result = CheckResult::new(key, verdict);
            tracing::debug!(status = %result.status, detail = ?result.error_detail, "key checked");
            lock(&self.results).push(result.clone());
            self.emit(CheckerEvent::KeyChecked { index, result });
            if stopped {
                return LoopExit::Cancelled;
            }

            if index + 1 < total && !cancel.is_cancelled() {
                let pause = self.settings.delay.pick();
                tracing::debug!(pause_ms = pause.as_millis() as u64, "waiting before next key");
                if sleep_cancellable(pause, self.settings.delay.step, cancel).await {
                    return LoopExit::Cancelled;
                }
            }
        }
        if cancel.is_cancelled() {
            LoopExit::Cancelled
        } else {
            LoopExit::Finished
        }
    }
}

#[cfg(test)]
mod tests;
