// File: feedguard-core/src/tasks/timers.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    /// `None` while the task is being spawned.
    pending: HashMap<u64, Option<AbortHandle>>,
}

/// Registry of cancellable one-shot timeouts.
///
/// A callback runs only if its entry is still registered when the delay
/// expires, so once `cancel` or `cancel_all` returns the affected callbacks
/// are guaranteed not to start. Must be used from inside a tokio runtime.
#[derive(Clone, Default)]
pub struct TimerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.pending.insert(id, None);
            id
        };

        let registry = self.inner.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let still_wanted = registry.lock().pending.remove(&id).is_some();
            if still_wanted {
                callback();
            } else {
                trace!("Timer {} was cancelled before firing", id);
            }
        });

        let mut inner = self.inner.lock();
        if let Some(slot) = inner.pending.get_mut(&id) {
            *slot = Some(handle.abort_handle());
        }
        TimerId(id)
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        let entry = self.inner.lock().pending.remove(&id.0);
        match entry {
            Some(handle) => {
                if let Some(h) = handle {
                    h.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Cancel everything. Returns how many timers were pending.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Option<AbortHandle>> = {
            let mut inner = self.inner.lock();
            inner.pending.drain().map(|(_, h)| h).collect()
        };
        let count = drained.len();
        for handle in drained.into_iter().flatten() {
            handle.abort();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let timers = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        timers.schedule(Duration::from_millis(100), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(timers.pending(), 1);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        let timers = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let id = timers.schedule(Duration::from_millis(100), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let timers = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for ms in [10u64, 20, 30] {
            let f = fired.clone();
            timers.schedule(Duration::from_millis(ms), move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(timers.cancel_all(), 3);
        assert_eq!(timers.pending(), 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // still usable afterwards
        let f = fired.clone();
        timers.schedule(Duration::from_millis(5), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
