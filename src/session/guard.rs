//! Per-session deadline timer

use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Deadline timer for one session
///
/// Runs `on_expire` once the deadline passes unless disarmed first. Disarming
/// only stops the timer; whether an expiry still applies is decided by the
/// status test-and-set inside `on_expire`, so a guard that fires after losing
/// the race is harmless.
pub struct TimeoutGuard {
    handle: JoinHandle<()>,
}

impl TimeoutGuard {
    /// Arm a timer that runs `on_expire` at `deadline`
    pub fn arm<F>(deadline: Instant, on_expire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expire.await;
        });

        Self { handle }
    }

    /// Check if the timer task has finished (fired or cancelled)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the timer
    pub fn disarm(self) {
        if !self.handle.is_finished() {
            debug!("Disarming timeout guard");
            self.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_guard_fires_at_deadline() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let guard = TimeoutGuard::arm(Instant::now() + Duration::from_millis(50), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(guard.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_guard_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let guard = TimeoutGuard::arm(Instant::now() + Duration::from_millis(50), async move {
            flag.store(true, Ordering::SeqCst);
        });
        guard.disarm();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
