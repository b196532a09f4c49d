//! Periodic peer health sweep.

use crate::network::registry::PeerHandle;
use std::time::Duration;
use tokio::time::interval;

/// Spawn the background task that re-validates the peer set every
/// `period`. The sweep itself runs on the registry's turn; this task only
/// paces it.
pub fn spawn(peers: PeerHandle, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        // The first tick fires immediately; skip it so a freshly started
        // node isn't sweeping an empty registry.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let dropped = peers.check_peers().await;
            if dropped > 0 {
                log::debug!("Health sweep evicted {} peer(s)", dropped);
            }
        }
    })
}
