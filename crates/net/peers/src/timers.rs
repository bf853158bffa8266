//! One-shot, cancellable backoff timers keyed by peer.
//!
//! Each peer has at most one pending timer. Timers are tokio tasks sleeping until a
//! deadline; every timer carries a generation so a task that wakes after it was
//! cancelled or replaced can tell it is stale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_net_peer_store::NetPeerId;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct ScheduledTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub(crate) struct BackoffTimers<Id: NetPeerId> {
    runtime: Handle,
    next_generation: AtomicU64,
    timers: Mutex<HashMap<Id, ScheduledTimer>>,
}

impl<Id: NetPeerId> BackoffTimers<Id> {
    pub(crate) fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_generation: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Run `on_fire(generation)` at `deadline`, replacing any timer pending for `id`.
    ///
    /// The callback should pass its generation to [`Self::complete`] before acting.
    pub(crate) fn schedule<F>(&self, id: Id, deadline: Instant, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Spawn under the lock so the task cannot complete before its entry exists.
        let mut timers = self.timers.lock();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(generation);
        });

        if let Some(previous) = timers.insert(id, ScheduledTimer { generation, handle }) {
            previous.handle.abort();
        }

        generation
    }

    /// Stop and forget the timer for `id`. Safe to call when none is pending.
    pub(crate) fn cancel(&self, id: &Id) -> bool {
        match self.timers.lock().remove(id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for a timer that just fired.
    ///
    /// Returns false if the timer was cancelled or replaced in the meantime.
    pub(crate) fn complete(&self, id: &Id, generation: u64) -> bool {
        let mut timers = self.timers.lock();
        match timers.get(id) {
            Some(timer) if timer.generation == generation => {
                timers.remove(id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn contains(&self, id: &Id) -> bool {
        self.timers.lock().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn timers() -> Arc<BackoffTimers<String>> {
        Arc::new(BackoffTimers::new(Handle::current()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once() {
        let timers = timers();
        let fired = Arc::new(AtomicUsize::new(0));

        let (t, f) = (Arc::clone(&timers), Arc::clone(&fired));
        let deadline = Instant::now() + Duration::from_secs(2);
        timers.schedule("a".to_string(), deadline, move |generation| {
            if t.complete(&"a".to_string(), generation) {
                f.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(timers.contains(&"a".to_string()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timers.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let timers = timers();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        let deadline = Instant::now() + Duration::from_secs(1);
        timers.schedule("a".to_string(), deadline, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        assert!(timers.cancel(&"a".to_string()));
        assert!(!timers.cancel(&"a".to_string()));
        assert!(!timers.cancel(&"b".to_string()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_aborts_previous() {
        let timers = timers();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let now = Instant::now();
        let mut generations = Vec::new();
        for secs in [1, 2] {
            let (t, f) = (Arc::clone(&timers), Arc::clone(&fired));
            generations.push(timers.schedule(
                "a".to_string(),
                now + Duration::from_secs(secs),
                move |generation| {
                    if t.complete(&"a".to_string(), generation) {
                        f.lock().push(generation);
                    }
                },
            ));
        }
        assert_eq!(timers.len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*fired.lock(), vec![generations[1]]);
    }

    #[tokio::test]
    async fn test_stale_generation_rejected() {
        let timers = timers();
        let deadline = Instant::now() + Duration::from_secs(60);
        let generation = timers.schedule("a".to_string(), deadline, |_| {});

        assert!(!timers.complete(&"a".to_string(), generation + 1));
        assert!(timers.contains(&"a".to_string()));
        assert!(timers.complete(&"a".to_string(), generation));
        assert!(!timers.complete(&"a".to_string(), generation));
    }
}
