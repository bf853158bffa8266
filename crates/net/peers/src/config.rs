//! Peer tracker configuration.

use serde::{Deserialize, Serialize};

use crate::error::PeerStatsError;

/// Consecutive failures tolerated before a peer is blacklisted.
///
/// Backoff doubles per failure, so the last window before blacklisting lasts
/// roughly `2^(n-1)` seconds.
pub const DEFAULT_FAILURES_UNTIL_BLACKLIST: u32 = 16;

/// Peer tracker configuration (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatsConfig {
    /// Consecutive failed backoff windows before the peer is blacklisted.
    #[serde(default = "default_failures_until_blacklist")]
    pub failures_until_blacklist: u32,
}

impl Default for PeerStatsConfig {
    fn default() -> Self {
        Self {
            failures_until_blacklist: default_failures_until_blacklist(),
        }
    }
}

impl PeerStatsConfig {
    pub fn with_failures_until_blacklist(failures_until_blacklist: u32) -> Self {
        Self {
            failures_until_blacklist,
        }
    }

    pub fn validate(&self) -> Result<(), PeerStatsError> {
        if self.failures_until_blacklist == 0 {
            return Err(PeerStatsError::InvalidConfig(
                "failures_until_blacklist must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_failures_until_blacklist() -> u32 {
    DEFAULT_FAILURES_UNTIL_BLACKLIST
}
