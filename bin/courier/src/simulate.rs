//! Replay scripted outcomes against a live tracker.

use std::sync::Arc;

use courier_net_peer_store::{BlacklistStore, FileBlacklistStore, MemoryBlacklistStore};
use courier_net_peers::{FailureOutcome, PeerState, PeerStateStore, PeerStatsConfig};
use eyre::{Result, WrapErr};
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cli::{PeerScript, SimulateArgs, Step};
use crate::config::CourierConfig;

type SharedBlacklist = Arc<dyn BlacklistStore<String>>;

/// Open the configured blacklist, or an in-memory one when no file is set.
pub(crate) fn open_blacklist(config: &CourierConfig) -> Result<SharedBlacklist> {
    match &config.blacklist_file {
        Some(path) => {
            let store = FileBlacklistStore::new_with_create_dir(path)
                .wrap_err_with(|| format!("failed to open blacklist {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryBlacklistStore::new())),
    }
}

pub(crate) async fn run(mut config: CourierConfig, args: SimulateArgs) -> Result<()> {
    args.validate()?;

    if let Some(failures) = args.failures_until_blacklist {
        config.peers = PeerStatsConfig::with_failures_until_blacklist(failures);
    }
    if let Some(path) = args.blacklist_file {
        config.blacklist_file = Some(path);
    }

    let blacklist = open_blacklist(&config)?;
    let store = PeerStateStore::new(config.peers.clone(), Arc::clone(&blacklist))
        .wrap_err("failed to create peer tracker")?;

    info!(
        peers = args.peers.len(),
        failures_until_blacklist = store.failures_until_blacklist(),
        "replaying outcome scripts"
    );

    let runs = args
        .peers
        .iter()
        .map(|script| replay(store.get(script.id.clone()), script));
    join_all(runs).await;

    for script in &args.peers {
        let peer = store.get(script.id.clone());
        let durable = blacklist.is_blacklisted(&script.id).unwrap_or_else(|e| {
            warn!(id = %script.id, error = %e, "failed to read blacklist");
            false
        });
        println!(
            "{:<32} {:<12} backoff_count={:<3} successes={:<3} durable_blacklist={}",
            script.id,
            format!("{:?}", peer.health()),
            peer.backoff_count(),
            peer.success_count(),
            durable,
        );
    }

    Ok(())
}

async fn replay(peer: Arc<PeerState<String>>, script: &PeerScript) {
    let window_done = Arc::new(Notify::new());
    let notify = Arc::clone(&window_done);
    peer.assign_backoff_notifier(move || notify.notify_one());

    for step in &script.steps {
        match step {
            Step::Failure => match peer.failure() {
                FailureOutcome::BackingOff { until } => {
                    let wait = until.saturating_duration_since(Instant::now());
                    info!(id = %script.id, count = peer.backoff_count(), ?wait, "backing off");
                    window_done.notified().await;
                }
                FailureOutcome::Blacklisted => {
                    info!(id = %script.id, "blacklisted, skipping attempt");
                }
            },
            Step::Success => {
                peer.success();
                info!(id = %script.id, "success");
            }
            Step::MarkAlive => match peer.mark_alive() {
                Ok(was_blacklisted) => info!(id = %script.id, was_blacklisted, "marked alive"),
                Err(e) => warn!(id = %script.id, error = %e, "marked alive, blacklist not updated"),
            },
        }
    }

    peer.clear_backoff_notifier();
}
