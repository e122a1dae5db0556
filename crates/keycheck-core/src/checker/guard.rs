//! RAII busy guard: at most one run per checker, released on every exit path.

use std::sync::Arc;
use tokio::sync::watch;

pub(crate) struct RunGuard {
    running: Arc<watch::Sender<bool>>,
}

impl RunGuard {
    /// Flip `running` false -> true. `None` if a run is already active.
    pub(crate) fn acquire(running: &Arc<watch::Sender<bool>>) -> Option<Self> {
        let acquired = running.send_if_modified(|r| {
            if *r {
                false
            } else {
                *r = true;
                true
            }
        });
        acquired.then(|| Self {
            running: Arc::clone(running),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.send_replace(false);
    }
}
