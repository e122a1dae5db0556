//! Randomized inter-key pause and the stepped, cancellable sleep.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DelayConfig;

const MIN_STEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub min: Duration,
    pub span: Duration,
    pub step: Duration,
}

impl DelayPolicy {
    pub fn from_config(cfg: &DelayConfig) -> Self {
        Self {
            min: Duration::from_millis(cfg.min_ms),
            span: Duration::from_millis(cfg.span_ms),
            step: Duration::from_millis(cfg.step_ms).max(MIN_STEP),
        }
    }

    /// Constant pause of `pause`, polled every `step`.
    pub fn fixed(pause: Duration, step: Duration) -> Self {
        Self {
            min: pause,
            span: Duration::ZERO,
            step: step.max(MIN_STEP),
        }
    }

    /// Uniform pick in [min, min + span] at millisecond resolution.
    pub fn pick(&self) -> Duration {
        let span_ms = u64::try_from(self.span.as_millis()).unwrap_or(u64::MAX);
        if span_ms == 0 {
            return self.min;
        }
        let extra = rand::rng().random_range(0..=span_ms);
        self.min.saturating_add(Duration::from_millis(extra))
    }
}

/// Sleep `total` in slices of `step`, checking `cancel` before each slice.
/// Returns true if cancelled before the full duration elapsed.
pub async fn sleep_cancellable(total: Duration, step: Duration, cancel: &CancellationToken) -> bool {
    let step = step.max(MIN_STEP);
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(step.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_stays_within_bounds() {
        let p = DelayPolicy {
            min: Duration::from_millis(1_000),
            span: Duration::from_millis(9_000),
            step: Duration::from_millis(100),
        };
        for _ in 0..200 {
            let d = p.pick();
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(10_000));
        }
    }

    #[test]
    fn zero_span_is_constant() {
        let p = DelayPolicy::fixed(Duration::from_millis(250), Duration::from_millis(10));
        assert_eq!(p.pick(), Duration::from_millis(250));
    }

    #[test]
    fn step_never_zero() {
        let p = DelayPolicy::from_config(&DelayConfig {
            min_ms: 0,
            span_ms: 0,
            step_ms: 0,
        });
        assert_eq!(p.step, MIN_STEP);
    }

    #[tokio::test(start_paused = true)]
    async fn full_sleep_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let cancelled = sleep_cancellable(Duration::from_secs(3), Duration::from_millis(100), &cancel).await;
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_noticed_within_one_step() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            trigger.cancel();
        });
        let start = Instant::now();
        let cancelled = sleep_cancellable(Duration::from_secs(60), Duration::from_millis(100), &cancel).await;
        assert!(cancelled);
        assert!(start.elapsed() <= Duration::from_millis(550));
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(sleep_cancellable(Duration::from_secs(60), Duration::from_millis(100), &cancel).await);
    }
}
