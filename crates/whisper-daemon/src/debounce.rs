//! Cancel-and-reschedule debouncing for slider-driven writes.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Scheduled {
    generation: u64,
    token: CancellationToken,
}

/// Applies only the last action scheduled for a key within the window.
pub struct Debouncer<K> {
    window: Duration,
    pending: Arc<Mutex<HashMap<K, Scheduled>>>,
    generation: Mutex<u64>,
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, pending: Arc::new(Mutex::new(HashMap::new())), generation: Mutex::new(0) }
    }

    /// Schedule `action` for `key`, cancelling whatever was pending for it.
    pub fn schedule<F, Fut>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut next = self.generation.lock();
            *next += 1;
            *next
        };
        let token = CancellationToken::new();
        let previous =
            self.pending.lock().insert(key.clone(), Scheduled { generation, token: token.clone() });
        if let Some(previous) = previous {
            trace!(?key, "Superseding pending write");
            previous.token.cancel();
        }

        let deadline = Instant::now() + self.window;
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = sleep_until(deadline) => {
                    {
                        let mut pending = pending.lock();
                        if pending.get(&key).is_some_and(|s| s.generation == generation) {
                            pending.remove(&key);
                        }
                    }
                    action().await;
                }
            }
        });
    }

    /// Drop every pending action.
    pub fn cancel_all(&self) {
        for (_, scheduled) in self.pending.lock().drain() {
            scheduled.token.cancel();
        }
    }

    /// Number of keys with an action waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}
