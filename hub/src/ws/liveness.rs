//! Liveness supervisor.
//!
//! Periodically probes every open session and evicts any session whose last
//! liveness signal exceeds the configured timeout. Advisory, not
//! transactional: an evicted session runs through the normal disconnect
//! path and is indistinguishable downstream from a normal close.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::hub::ConnectionHub;

/// Handle to a running liveness supervisor.
#[derive(Debug)]
pub struct LivenessHandle {
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl LivenessHandle {
    /// Spawns the supervisor for a hub.
    #[must_use]
    pub fn spawn(hub: Arc<ConnectionHub>) -> Self {
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run(hub, shutdown_rx));
        Self { shutdown, task }
    }

    /// Stops the supervisor; both sweeps are cancelled as a unit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(()).await;
        let _ = self.task.await;
    }
}

async fn run(hub: Arc<ConnectionHub>, mut shutdown_rx: mpsc::Receiver<()>) {
    let mut ping = interval(hub.config().ping_interval);
    let mut evict = interval(hub.config().eviction_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    evict.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick of a fresh interval completes immediately.
    ping.tick().await;
    evict.tick().await;

    debug!("liveness supervisor started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("liveness supervisor stopped");
                return;
            }
            _ = ping.tick() => {
                hub.ping_sweep().await;
            }
            _ = evict.tick() => {
                hub.eviction_sweep().await;
            }
        }
    }
}
