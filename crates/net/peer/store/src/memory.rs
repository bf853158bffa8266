//! In-memory blacklist store (does not persist across restarts).
//!
//! Failure injection and call counters are available with the `test-utils` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{BlacklistOp, BlacklistStore, BlacklistStoreError, NetPeerId};

/// In-memory blacklist store, for ephemeral nodes and tests.
///
/// With `test-utils`, reads and writes can be made to fail on demand to exercise the
/// tracker's best-effort handling of durable-store errors.
#[derive(Debug)]
pub struct MemoryBlacklistStore<Id: NetPeerId> {
    peers: RwLock<HashSet<Id>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl<Id: NetPeerId> Default for MemoryBlacklistStore<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: NetPeerId> MemoryBlacklistStore<Id> {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashSet::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_peers(peers: impl IntoIterator<Item = Id>) -> Self {
        Self {
            peers: RwLock::new(peers.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Make `is_blacklisted` and `blacklisted` fail until reset.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make `add` and `remove` fail until reset.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Read calls attempted, including failed ones.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Write calls attempted, including failed ones.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.peers.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_read(&self, op: BlacklistOp) -> Result<(), BlacklistStoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(injected(op));
        }
        Ok(())
    }

    fn check_write(&self, op: BlacklistOp) -> Result<(), BlacklistStoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(injected(op));
        }
        Ok(())
    }
}

fn injected(op: BlacklistOp) -> BlacklistStoreError {
    BlacklistStoreError::Storage {
        op,
        reason: "injected failure".to_string(),
    }
}

impl<Id: NetPeerId> BlacklistStore<Id> for MemoryBlacklistStore<Id> {
    fn is_blacklisted(&self, id: &Id) -> Result<bool, BlacklistStoreError> {
        self.check_read(BlacklistOp::Check)?;
        Ok(self.peers.read().contains(id))
    }

    fn add(&self, id: &Id) -> Result<(), BlacklistStoreError> {
        self.check_write(BlacklistOp::Add)?;
        self.peers.write().insert(id.clone());
        Ok(())
    }

    fn remove(&self, id: &Id) -> Result<(), BlacklistStoreError> {
        self.check_write(BlacklistOp::Remove)?;
        self.peers.write().remove(id);
        Ok(())
    }

    fn blacklisted(&self) -> Result<Vec<Id>, BlacklistStoreError> {
        self.check_read(BlacklistOp::List)?;
        Ok(self.peers.read().iter().cloned().collect())
    }
}
