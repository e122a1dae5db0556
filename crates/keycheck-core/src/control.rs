//! Checker registration and stop forwarding.
//!
//! The relay never owns a checker. Whoever builds one attaches it to a
//! [`CheckerSlot`]; `relayStop()` and `start` reach whatever is attached at the
//! time. Attaching the same checker twice is a no-op.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::checker::CheckerError;
use crate::model::KeyRecord;

/// What the relay needs from an attached checker.
pub trait CheckerPort: Send + Sync {
    /// Begin a run in the background. Busy if one is already active.
    fn start(&self, keys: Vec<KeyRecord>) -> Result<(), CheckerError>;
    /// Request a stop; false if nothing was running.
    fn stop(&self) -> bool;
}

/// Result of forwarding a stop. Neither variant is an error: the loop may
/// already have finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Signalled,
    NoActiveChecker,
}

impl StopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopOutcome::Signalled => "stopped",
            StopOutcome::NoActiveChecker => "no-checker",
        }
    }
}

#[derive(Default)]
pub struct CheckerSlot {
    attached: RwLock<Option<Arc<dyn CheckerPort>>>,
}

impl CheckerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `checker`. Returns false when that same checker is already
    /// attached; a different checker replaces the previous one.
    pub fn attach(&self, checker: Arc<dyn CheckerPort>) -> bool {
        let mut slot = self.attached.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = slot.as_ref() {
            if same_checker(current, &checker) {
                return false;
            }
        }
        *slot = Some(checker);
        true
    }

    pub fn detach(&self) {
        *self.attached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current(&self) -> Option<Arc<dyn CheckerPort>> {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn start(&self, keys: Vec<KeyRecord>) -> Result<(), CheckerError> {
        self.current().ok_or(CheckerError::NotAttached)?.start(keys)
    }

    pub fn stop(&self) -> StopOutcome {
        match self.current() {
            Some(checker) if checker.stop() => StopOutcome::Signalled,
            Some(_) => {
                tracing::debug!("stop forwarded but the checker was idle");
                StopOutcome::NoActiveChecker
            }
            None => {
                tracing::debug!("stop requested with no checker attached");
                StopOutcome::NoActiveChecker
            }
        }
    }
}

fn same_checker(a: &Arc<dyn CheckerPort>, b: &Arc<dyn CheckerPort>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("keycheck")?.get_state_home();
    Ok(dir.join("keycheck").join("control.sock"))
}
