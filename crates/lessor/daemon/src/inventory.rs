//! Periodic cluster inventory snapshots

use lessor_cluster::ClusterClient;
use lessor_types::Inventory;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct InventoryPoller {
    client: Arc<dyn ClusterClient>,
    period: Duration,
    debug_frequency: u32,
}

impl InventoryPoller {
    pub fn new(client: Arc<dyn ClusterClient>, period: Duration, debug_frequency: u32) -> Self {
        Self {
            client,
            period,
            debug_frequency,
        }
    }

    pub fn spawn(self) -> InventoryHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(snapshot_tx, shutdown_rx));

        InventoryHandle {
            snapshot: snapshot_rx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(
        self,
        snapshot_tx: watch::Sender<Option<Inventory>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.client.inventory() => result,
            };

            match result {
                Ok(inventory) => {
                    polls += 1;
                    let available = inventory.total_available();
                    if self.debug_frequency > 0 && polls % u64::from(self.debug_frequency) == 0 {
                        info!(
                            nodes = inventory.nodes.len(),
                            cpu_millis = available.cpu_millis,
                            memory_bytes = available.memory_bytes,
                            storage_bytes = available.storage_bytes,
                            gpu = available.gpu,
                            "Cluster inventory"
                        );
                    } else {
                        debug!(nodes = inventory.nodes.len(), cpu_millis = available.cpu_millis, "Inventory polled");
                    }
                    snapshot_tx.send_replace(Some(inventory));
                }
                // The previous snapshot stays published
                Err(e) => warn!(error = %e, "Inventory poll failed"),
            }
        }

        debug!("Inventory poller stopped");
    }
}

pub struct InventoryHandle {
    snapshot: watch::Receiver<Option<Inventory>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl InventoryHandle {
    /// Latest successful snapshot, if any poll has succeeded yet
    pub fn snapshot(&self) -> Option<Inventory> {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Inventory>> {
        self.snapshot.clone()
    }

    /// Stop polling and wait for the task; idempotent
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Inventory poller ended abnormally");
            }
        }
    }
}
