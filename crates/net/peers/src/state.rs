//! Per-peer backoff and blacklist state machine.
//!
//! Flags and counters are atomics. The `backoff_active` flip from false to true is the
//! single point where a failure wins the right to start a backoff window, so concurrent
//! failures against one peer share a window instead of stacking them.
//!
//! Opening a window and resetting the peer both run under a per-peer transition lock, so a
//! success can never land between a failure winning the window and its timer being
//! installed. Failures that find a window already open never touch the lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use courier_net_peer_backoff::backoff_duration;
use courier_net_peer_store::NetPeerId;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::error::PeerStatsError;
use crate::store::Shared;

/// Callback run when a backoff window completes.
pub type BackoffNotifier = Arc<dyn Fn() + Send + Sync>;

/// Observed health of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerHealth {
    Healthy,
    BackingOff,
    Blacklisted,
}

/// Result of reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Do not retry before `until`.
    BackingOff { until: Instant },
    /// Stop trying this peer until it is revived.
    Blacklisted,
}

impl FailureOutcome {
    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted)
    }

    pub fn until(&self) -> Option<Instant> {
        match self {
            Self::BackingOff { until } => Some(*until),
            Self::Blacklisted => None,
        }
    }
}

/// Backoff and blacklist state for one remote peer.
///
/// Obtained from [`PeerStateStore::get`](crate::PeerStateStore::get) and shared by every
/// caller reporting outcomes for that peer.
pub struct PeerState<Id: NetPeerId> {
    id: Id,
    shared: Arc<Shared<Id>>,

    blacklisted: AtomicBool,
    backoff_active: AtomicBool,
    backoff_count: AtomicU32,
    success_count: AtomicU32,

    /// Last deadline set; kept after the window elapses, cleared on success.
    backoff_until: RwLock<Option<Instant>>,

    notifier: Mutex<Option<BackoffNotifier>>,

    /// Serializes window opening against `reset`.
    transition: Mutex<()>,
}

impl<Id: NetPeerId> PeerState<Id> {
    pub(crate) fn new(id: Id, shared: Arc<Shared<Id>>, blacklisted: bool) -> Self {
        Self {
            id,
            shared,
            blacklisted: AtomicBool::new(blacklisted),
            backoff_active: AtomicBool::new(false),
            backoff_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            backoff_until: RwLock::new(None),
            notifier: Mutex::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Record a successful interaction: clears blacklist and backoff and resets the
    /// failure count.
    ///
    /// Only the in-memory flag is cleared; a durable blacklist entry stays until
    /// [`mark_alive`](Self::mark_alive) removes it.
    pub fn success(&self) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.reset();
    }

    /// Record a failed interaction and start backing off if not already.
    ///
    /// Concurrent failures while a window is pending are coalesced into it and return
    /// the pending deadline.
    pub fn failure(self: &Arc<Self>) -> FailureOutcome {
        if self.blacklisted.load(Ordering::Acquire) {
            return FailureOutcome::Blacklisted;
        }
        if self.backoff_active.load(Ordering::Acquire) {
            return self.coalesced();
        }

        let _transition = self.transition.lock();

        // Another failure may have blacklisted the peer while we waited for the lock.
        if self.blacklisted.load(Ordering::Acquire) {
            return FailureOutcome::Blacklisted;
        }
        if self
            .backoff_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.coalesced();
        }

        let count = self.backoff_count.fetch_add(1, Ordering::AcqRel) + 1;

        if count >= self.shared.failures_until_blacklist {
            self.blacklisted.store(true, Ordering::Release);
            self.backoff_count.store(0, Ordering::Release);
            if let Err(e) = self.shared.blacklist.add(&self.id) {
                error!(id = ?self.id, error = %e, "failed to persist blacklist entry");
            }
            self.clear_backoff();
            warn!(id = ?self.id, failures = count, "peer blacklisted");
            return FailureOutcome::Blacklisted;
        }

        let duration = backoff_duration(count);
        let until = Instant::now() + duration;
        *self.backoff_until.write() = Some(until);

        let peer = Arc::clone(self);
        self.shared
            .schedule_timer(self.id.clone(), until, move |generation| {
                peer.backoff_finished(generation)
            });

        debug!(id = ?self.id, count, ?duration, "backing off peer");
        FailureOutcome::BackingOff { until }
    }

    /// Lift a blacklist. Returns whether the peer was blacklisted.
    ///
    /// No-op for a peer that is not blacklisted. In-memory state is cleared even if the
    /// durable entry could not be removed; that failure is returned so the caller can
    /// reconcile.
    pub fn mark_alive(&self) -> Result<bool, PeerStatsError> {
        if !self.blacklisted.load(Ordering::Acquire) {
            return Ok(false);
        }

        let removed = self.shared.blacklist.remove(&self.id);
        self.reset();

        match removed {
            Ok(()) => {
                debug!(id = ?self.id, "peer revived");
                Ok(true)
            }
            Err(e) => {
                error!(id = ?self.id, error = %e, "failed to remove blacklist entry");
                Err(e.into())
            }
        }
    }

    /// Set the callback run when the current or next backoff window completes.
    pub fn assign_backoff_notifier<F>(&self, notifier: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.notifier.lock() = Some(Arc::new(notifier));
    }

    pub fn clear_backoff_notifier(&self) {
        *self.notifier.lock() = None;
    }

    /// Deadline of the current or most recent backoff window.
    pub fn backoff_info(&self) -> Option<Instant> {
        *self.backoff_until.read()
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted.load(Ordering::Acquire)
    }

    pub fn is_backing_off(&self) -> bool {
        self.backoff_active.load(Ordering::Acquire)
    }

    pub fn backoff_count(&self) -> u32 {
        self.backoff_count.load(Ordering::Acquire)
    }

    /// Successful interactions so far. Useful for building transaction ids.
    pub fn success_count(&self) -> u32 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> PeerHealth {
        if self.is_blacklisted() {
            PeerHealth::Blacklisted
        } else if self.is_backing_off() {
            PeerHealth::BackingOff
        } else {
            PeerHealth::Healthy
        }
    }

    fn coalesced(&self) -> FailureOutcome {
        // The winner may not have published its deadline yet.
        let until = self.backoff_info().unwrap_or_else(Instant::now);
        trace!(id = ?self.id, "failure coalesced into pending backoff");
        FailureOutcome::BackingOff { until }
    }

    fn reset(&self) {
        let _transition = self.transition.lock();
        self.blacklisted.store(false, Ordering::Release);
        self.backoff_count.store(0, Ordering::Release);
        *self.backoff_until.write() = None;
        self.clear_backoff();
    }

    fn clear_backoff(&self) {
        self.shared.cancel_timer(&self.id);
        self.backoff_active.store(false, Ordering::Release);
    }

    fn backoff_finished(&self, generation: u64) {
        if !self.shared.complete_timer(&self.id, generation) {
            trace!(id = ?self.id, generation, "stale backoff timer ignored");
            return;
        }
        self.backoff_active.store(false, Ordering::Release);
        trace!(id = ?self.id, "backoff window elapsed");

        // Snapshot so the callback may reassign the notifier without deadlocking.
        let notifier = self.notifier.lock().clone();
        if let Some(notify) = notifier {
            notify();
        }
    }
}

impl<Id: NetPeerId> fmt::Debug for PeerState<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerState")
            .field("id", &self.id)
            .field("blacklisted", &self.is_blacklisted())
            .field("backoff_active", &self.is_backing_off())
            .field("backoff_count", &self.backoff_count())
            .field("backoff_until", &self.backoff_info())
            .field("success_count", &self.success_count())
            .finish_non_exhaustive()
    }
}
