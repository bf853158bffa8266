//! Per-peer backoff and blacklist tracking for outbound traffic to remote peers.
//!
//! A [`PeerStateStore`] hands out one shared [`PeerState`] per peer. Callers report
//! [`success`](PeerState::success) or [`failure`](PeerState::failure) after each attempt;
//! failures open exponentially growing, jittered backoff windows and, past the configured
//! threshold, blacklist the peer in memory and in a durable [`BlacklistStore`].

pub mod config;
pub mod error;
pub mod state;
pub mod store;
mod timers;

pub use config::{DEFAULT_FAILURES_UNTIL_BLACKLIST, PeerStatsConfig};
pub use courier_net_peer_store::{BlacklistStore, BlacklistStoreError, NetPeerId};
pub use error::PeerStatsError;
pub use state::{BackoffNotifier, FailureOutcome, PeerHealth, PeerState};
pub use store::PeerStateStore;
