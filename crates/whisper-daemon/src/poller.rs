//! Periodic background refresh.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Poll loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Stopped,
    Running,
}

/// Runs a tick every interval until stopped.
///
/// Stopping is cooperative: a tick already running completes, and a loop
/// stopped while sleeping wakes up, sees the flag and exits without ticking.
pub struct PollLoop {
    interval: Duration,
    running: Mutex<Option<Arc<AtomicBool>>>,
}

impl PollLoop {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, running: Mutex::new(None) }
    }

    #[must_use]
    pub fn state(&self) -> PollState {
        match &*self.running.lock() {
            Some(flag) if flag.load(Ordering::SeqCst) => PollState::Running,
            _ => PollState::Stopped,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. Does nothing if already running.
    pub fn start<F, Fut>(&self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            warn!("Poll loop already running");
            return;
        }

        // Each run gets its own flag so a loop stopped mid-sleep never
        // observes a later restart.
        let flag = Arc::new(AtomicBool::new(true));
        *running = Some(Arc::clone(&flag));

        let interval = self.interval;
        info!(interval_secs = interval.as_secs(), "Poll loop started");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                tick().await;
            }
            debug!("Poll loop exited");
        });
    }

    /// Ask the loop to stop after its current sleep or tick.
    pub fn stop(&self) {
        if let Some(flag) = self.running.lock().take() {
            flag.store(false, Ordering::SeqCst);
            info!("Poll loop stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting(poll: &PollLoop) -> Arc<AtomicUsize> {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        poll.start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_interval() {
        let poll = PollLoop::new(Duration::from_secs(10));
        let ticks = counting(&poll);
        assert_eq!(poll.state(), PollState::Running);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_sleep_fires_nothing() {
        let poll = PollLoop::new(Duration::from_secs(10));
        let ticks = counting(&poll);

        sleep(Duration::from_secs(15)).await;
        poll.stop();
        assert_eq!(poll.state(), PollState::Stopped);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_revive_old_loop() {
        let poll = PollLoop::new(Duration::from_secs(10));
        let ticks = counting(&poll);

        sleep(Duration::from_secs(5)).await;
        poll.stop();
        let restarted = counting(&poll);

        sleep(Duration::from_secs(12)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(restarted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_never_overlap() {
        let poll = PollLoop::new(Duration::from_secs(10));
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let (a, o) = (Arc::clone(&active), Arc::clone(&overlapped));
        poll.start(move || {
            let (active, overlapped) = (Arc::clone(&a), Arc::clone(&o));
            async move {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                sleep(Duration::from_secs(25)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(120)).await;
        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
