//! Durable blacklist persistence for remote peers.
//!
//! The peer tracker only needs three things from durable storage: ask whether a peer is
//! blacklisted, add it, and remove it. [`BlacklistStore`] captures that contract; backends
//! decide how membership survives restarts.

mod file;
mod memory;

use std::fmt::Debug;
use std::hash::Hash;

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

pub use file::FileBlacklistStore;
pub use memory::MemoryBlacklistStore;

/// Blanket-implemented for any type usable as a peer identifier.
pub trait NetPeerId:
    Clone + Eq + Hash + Send + Sync + Debug + Serialize + for<'de> Deserialize<'de> + 'static
{
}

impl<T> NetPeerId for T where
    T: Clone + Eq + Hash + Send + Sync + Debug + Serialize + for<'de> Deserialize<'de> + 'static
{
}

/// Blacklist operation, carried in errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BlacklistOp {
    Check,
    Add,
    Remove,
    List,
}

#[derive(Debug, Error)]
pub enum BlacklistStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error during {op}: {reason}")]
    Storage { op: BlacklistOp, reason: String },
}

/// Durable blacklist membership, with auto-impl for &, Box, Arc.
#[auto_impl(&, Box, Arc)]
pub trait BlacklistStore<Id: NetPeerId>: Send + Sync {
    fn is_blacklisted(&self, id: &Id) -> Result<bool, BlacklistStoreError>;

    /// Add `id`. Adding an existing member is not an error.
    fn add(&self, id: &Id) -> Result<(), BlacklistStoreError>;

    /// Remove `id`. Removing a non-member is not an error.
    fn remove(&self, id: &Id) -> Result<(), BlacklistStoreError>;

    /// All current members, in no particular order.
    fn blacklisted(&self) -> Result<Vec<Id>, BlacklistStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names() {
        assert_eq!(BlacklistOp::Add.to_string(), "add");
        let name: &'static str = BlacklistOp::Remove.into();
        assert_eq!(name, "remove");
    }

    #[test]
    fn test_storage_error_message() {
        let err = BlacklistStoreError::Storage {
            op: BlacklistOp::Check,
            reason: "offline".to_string(),
        };
        assert_eq!(err.to_string(), "Storage error during check: offline");
    }
}
