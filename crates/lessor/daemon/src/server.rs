//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::inventory::{InventoryHandle, InventoryPoller};
use crate::status::StatusAggregator;
use axum::Router;
use lessor_balance::{BalanceChecker, BalanceCheckerHandle, BalanceReader, WithdrawalTrigger};
use lessor_bidengine::BidEngine;
use lessor_cluster::{ClusterClient, MemoryClusterClient};
use lessor_events::{EventBus, Subscription};
use lessor_monitor::LeaseManager;
use lessor_types::{EventEnvelope, EventSeverity, ProviderEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CLUSTER_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Lessor daemon, not yet started
pub struct Server {
    config: DaemonConfig,
    client: Arc<dyn ClusterClient>,
    balance_reader: Option<Arc<dyn BalanceReader>>,
    withdrawal_trigger: Option<Arc<dyn WithdrawalTrigger>>,
}

impl Server {
    /// Create a server backed by the in-memory reference cluster
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let client = Arc::new(MemoryClusterClient::new(config.cluster_config()));
        Self::with_cluster_client(config, client)
    }

    pub fn with_cluster_client(
        config: DaemonConfig,
        client: Arc<dyn ClusterClient>,
    ) -> DaemonResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            balance_reader: None,
            withdrawal_trigger: None,
        })
    }

    /// Enable the balance checker with the given chain reader
    pub fn with_balance_reader(mut self, reader: Arc<dyn BalanceReader>) -> Self {
        self.balance_reader = Some(reader);
        self
    }

    pub fn with_withdrawal_trigger(mut self, trigger: Arc<dyn WithdrawalTrigger>) -> Self {
        self.withdrawal_trigger = Some(trigger);
        self
    }

    /// Bring every component up and resume monitoring of running leases
    pub async fn start(self) -> DaemonResult<RunningDaemon> {
        let config = self.config;
        let client = self.client;

        wait_cluster_ready(client.as_ref(), config.cluster_wait_ready()).await?;

        let bus = EventBus::default();
        let event_logger = spawn_event_logger(bus.subscribe());

        let leases = Arc::new(LeaseManager::new(
            client.clone(),
            bus.clone(),
            config.monitor_config(),
            config.manifest_timeout(),
        ));
        let restored = leases.restore().await?;
        if restored > 0 {
            info!(restored, "Resumed monitoring of running leases");
        }

        let bidengine = Arc::new(BidEngine::new(config.bid_engine_config(), client.clone())?);
        let strategy = bidengine.strategy_name();

        let inventory = Arc::new(
            InventoryPoller::new(
                client.clone(),
                config.inventory_poll_period(),
                config.provider.inventory_debug_frequency,
            )
            .spawn(),
        );

        let balance = match self.balance_reader {
            Some(reader) => {
                let mut checker =
                    BalanceChecker::new(config.balance_checker_config(), reader, bus.clone());
                if let Some(trigger) = self.withdrawal_trigger {
                    checker = checker.with_withdrawal_trigger(trigger);
                }
                Some(checker.spawn())
            }
            None => {
                info!("No balance reader configured, balance checker disabled");
                None
            }
        };

        let status = StatusAggregator::new(
            leases.clone(),
            bidengine.clone(),
            Some(inventory.clone()),
            config.provider.public_hostname.clone(),
        );
        let state = AppState::new(leases.clone(), bidengine, status);
        let router = create_router(state, config.server.enable_cors);

        info!(
            strategy,
            public_hostname = ?config.provider.public_hostname,
            "Lessor daemon started"
        );

        Ok(RunningDaemon {
            config,
            router,
            bus,
            leases,
            inventory,
            balance,
            event_logger,
        })
    }

    /// Start, serve HTTP until a shutdown signal, then stop everything
    pub async fn run(self) -> DaemonResult<()> {
        let daemon = self.start().await?;
        let addr = daemon.config.server.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!("Lessor daemon listening on {}", addr);

        let served = axum::serve(listener, daemon.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()));

        info!("Lessor daemon shutting down");
        daemon.shutdown().await;
        served
    }
}

/// A started daemon: background tasks are running
pub struct RunningDaemon {
    config: DaemonConfig,
    router: Router,
    bus: EventBus,
    leases: Arc<LeaseManager>,
    inventory: Arc<InventoryHandle>,
    balance: Option<BalanceCheckerHandle>,
    event_logger: JoinHandle<()>,
}

impl RunningDaemon {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn leases(&self) -> &Arc<LeaseManager> {
        &self.leases
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn inventory(&self) -> &InventoryHandle {
        &self.inventory
    }

    pub fn balance(&self) -> Option<&BalanceCheckerHandle> {
        self.balance.as_ref()
    }

    /// Stop monitors, inventory poller and balance checker concurrently
    ///
    /// Leases stay deployed on the cluster so the next start can restore them.
    pub async fn shutdown(self) {
        let balance = async {
            if let Some(balance) = &self.balance {
                balance.shutdown().await;
            }
        };
        tokio::join!(self.leases.shutdown_all(), self.inventory.shutdown(), balance);

        self.bus.close();
        if let Err(e) = self.event_logger.await {
            warn!(error = %e, "Event logger ended abnormally");
        }
        info!("Lessor daemon stopped");
    }
}

/// Probe the cluster until it answers, for at most `limit`
async fn wait_cluster_ready(client: &dyn ClusterClient, limit: Duration) -> DaemonResult<()> {
    let probe = async {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match client.inventory().await {
                Ok(inventory) => {
                    info!(nodes = inventory.nodes.len(), attempts, "Cluster ready");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, attempts, "Cluster not ready");
                    tokio::time::sleep(CLUSTER_PROBE_INTERVAL).await;
                }
            }
        }
    };

    tokio::time::timeout(limit, probe)
        .await
        .map_err(|_| DaemonError::ClusterNotReady(limit))
}

/// Log every event published on the bus until it closes
fn spawn_event_logger(mut subscription: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = subscription.recv().await {
            log_event(&envelope);
        }
        debug!(dropped = subscription.dropped(), "Event logger stopped");
    })
}

fn log_event(envelope: &EventEnvelope) {
    let description = match &envelope.event {
        ProviderEvent::ClusterDeployment(d) => format!(
            "lease {} group {} {} ({}/{} available)",
            d.lease_id, d.group, d.status, d.available, d.total
        ),
        ProviderEvent::BalanceBelowThreshold { balance, threshold } => {
            format!("balance {balance} below threshold {threshold}")
        }
        ProviderEvent::WithdrawalTriggered { balance } => match balance {
            Some(balance) => format!("withdrawal triggered at balance {balance}"),
            None => "withdrawal triggered".to_string(),
        },
    };

    match envelope.severity {
        EventSeverity::Error => {
            error!(event_id = %envelope.id, source = ?envelope.source, "{description}")
        }
        EventSeverity::Warning => {
            warn!(event_id = %envelope.id, source = ?envelope.source, "{description}")
        }
        EventSeverity::Info => {
            info!(event_id = %envelope.id, source = ?envelope.source, "{description}")
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
