//! Errors surfaced by the peer tracker.

use courier_net_peer_store::BlacklistStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerStatsError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("backoff timers need a tokio runtime, none is running")]
    NoRuntime,
    #[error("blacklist store error: {0}")]
    Store(#[from] BlacklistStoreError),
}
