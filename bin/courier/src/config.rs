//! Configuration file handling.

use std::fs;
use std::path::{Path, PathBuf};

use courier_net_peers::PeerStatsConfig;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

/// Configuration for the courier binary (TOML-serializable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CourierConfig {
    /// Peer tracker settings
    #[serde(default)]
    pub(crate) peers: PeerStatsConfig,

    /// JSON file holding the durable blacklist. In-memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) blacklist_file: Option<PathBuf>,
}

impl CourierConfig {
    /// Load from `path`, or defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
        config
            .peers
            .validate()
            .wrap_err("invalid peer tracker configuration")?;

        Ok(config)
    }
}
