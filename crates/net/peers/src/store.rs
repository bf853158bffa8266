//! Registry of per-peer state, with Arc-per-peer handles for minimal lock contention.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_net_peer_store::{BlacklistStore, NetPeerId};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::PeerStatsConfig;
use crate::error::PeerStatsError;
use crate::state::PeerState;
use crate::timers::BackoffTimers;

/// Type alias for the internal peer map to avoid clippy::type_complexity.
type PeerMap<Id> = HashMap<Id, Arc<PeerState<Id>>>;

/// Context every peer reaches back into: threshold, timers, durable blacklist.
pub(crate) struct Shared<Id: NetPeerId> {
    pub(crate) failures_until_blacklist: u32,
    pub(crate) blacklist: Arc<dyn BlacklistStore<Id>>,
    timers: BackoffTimers<Id>,
}

impl<Id: NetPeerId> Shared<Id> {
    pub(crate) fn schedule_timer<F>(&self, id: Id, deadline: Instant, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.timers.schedule(id, deadline, on_fire)
    }

    pub(crate) fn cancel_timer(&self, id: &Id) -> bool {
        self.timers.cancel(id)
    }

    pub(crate) fn complete_timer(&self, id: &Id, generation: u64) -> bool {
        self.timers.complete(id, generation)
    }
}

/// Tracks backoff and blacklist state for every remote peer we talk to.
///
/// Callers get an `Arc<PeerState>` once via [`get`](Self::get); outcome reports on it are
/// lock-free apart from the timer map. Peers are never evicted.
pub struct PeerStateStore<Id: NetPeerId> {
    config: PeerStatsConfig,
    /// Brief lock to get Arc, then release. Reads are recursive so lookups never queue
    /// behind a waiting writer.
    peers: RwLock<PeerMap<Id>>,
    shared: Arc<Shared<Id>>,
}

impl<Id: NetPeerId> PeerStateStore<Id> {
    /// Create a store whose timers run on the current tokio runtime.
    pub fn new<S>(config: PeerStatsConfig, blacklist: S) -> Result<Self, PeerStatsError>
    where
        S: BlacklistStore<Id> + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| PeerStatsError::NoRuntime)?;
        Self::with_runtime(config, blacklist, runtime)
    }

    pub fn with_runtime<S>(
        config: PeerStatsConfig,
        blacklist: S,
        runtime: Handle,
    ) -> Result<Self, PeerStatsError>
    where
        S: BlacklistStore<Id> + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared {
            failures_until_blacklist: config.failures_until_blacklist,
            blacklist: Arc::new(blacklist),
            timers: BackoffTimers::new(runtime),
        });

        Ok(Self {
            config,
            peers: RwLock::new(HashMap::new()),
            shared,
        })
    }

    pub fn config(&self) -> &PeerStatsConfig {
        &self.config
    }

    pub fn failures_until_blacklist(&self) -> u32 {
        self.shared.failures_until_blacklist
    }

    /// Get or create peer state. Returns Arc that can be cached for lock-free access.
    ///
    /// New peers are hydrated from the durable blacklist; a read failure is logged and
    /// the peer starts out not blacklisted.
    pub fn get(&self, id: Id) -> Arc<PeerState<Id>> {
        // Fast path: read lock
        if let Some(state) = self.get_existing(&id) {
            return state;
        }

        // Hydrate outside the lock; losers of a creation race discard their candidate.
        let blacklisted = match self.shared.blacklist.is_blacklisted(&id) {
            Ok(blacklisted) => blacklisted,
            Err(e) => {
                error!(?id, error = %e, "failed to read blacklist entry");
                false
            }
        };
        let candidate = PeerState::new(id.clone(), Arc::clone(&self.shared), blacklisted);

        let mut peers = self.peers.write();
        let state = peers.entry(id).or_insert_with(|| {
            debug!(id = ?candidate.id(), blacklisted, "tracking new peer");
            Arc::new(candidate)
        });
        Arc::clone(state)
    }

    pub fn get_existing(&self, id: &Id) -> Option<Arc<PeerState<Id>>> {
        self.peers.read_recursive().get(id).map(Arc::clone)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.peers.read_recursive().contains_key(id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read_recursive().len()
    }

    pub fn peer_ids(&self) -> Vec<Id> {
        self.peers.read_recursive().keys().cloned().collect()
    }

    /// Number of backoff windows currently pending across all peers.
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.len()
    }

    pub fn has_pending_timer(&self, id: &Id) -> bool {
        self.shared.timers.contains(id)
    }
}

impl<Id: NetPeerId> fmt::Debug for PeerStateStore<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerStateStore")
            .field("config", &self.config)
            .field("peers", &self.peer_count())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}
