//! Configuration for lessord

use crate::error::{DaemonError, DaemonResult};
use lessor_balance::BalanceCheckerConfig;
use lessor_bidengine::{BidEngineConfig, CommitLevels, PricingStrategyConfig};
use lessor_cluster::MemoryClusterConfig;
use lessor_monitor::{MonitorConfig, RetryConfig};
use lessor_types::{Coin, NodeInventory, ResourceUnits};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub bidengine: BidEngineSection,

    #[serde(default)]
    pub balance_checker: BalanceCheckerSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// Nodes of the in-memory reference cluster
    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8443)),
            enable_cors: true,
        }
    }
}

/// Provider-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// How long startup waits for the cluster backend to answer
    pub cluster_wait_ready_secs: u64,

    /// Hostname under which forwarded ports are reachable
    pub public_hostname: Option<String>,

    pub external_port_quantity: u16,
    pub external_port_base: u16,

    pub inventory_poll_period_secs: u64,

    /// Log the full inventory at info level every N polls, 0 to never
    pub inventory_debug_frequency: u32,

    /// Time a won lease may wait for its manifest before it is dropped
    pub manifest_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cluster_wait_ready_secs: 30,
            public_hostname: None,
            external_port_quantity: 1_000,
            external_port_base: 30_000,
            inventory_poll_period_secs: 5,
            inventory_debug_frequency: 10,
            manifest_timeout_secs: 300,
        }
    }
}

/// Bid pricing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BidEngineSection {
    pub pricing: PricingStrategyConfig,
    pub deposit: Coin,
    pub cpu_commit_level: f64,
    pub memory_commit_level: f64,
    pub storage_commit_level: f64,
    pub blocked_hostnames: Vec<String>,
    pub deployment_ingress_static_hosts: bool,
    pub bid_timeout_ms: u64,
}

impl Default for BidEngineSection {
    fn default() -> Self {
        let engine = BidEngineConfig::default();
        Self {
            pricing: engine.pricing,
            deposit: engine.deposit,
            cpu_commit_level: engine.cpu_commit_level,
            memory_commit_level: engine.memory_commit_level,
            storage_commit_level: engine.storage_commit_level,
            blocked_hostnames: engine.blocked_hostnames,
            deployment_ingress_static_hosts: engine.deployment_ingress_static_hosts,
            bid_timeout_ms: 5_000,
        }
    }
}

/// Escrow balance polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceCheckerSection {
    pub polling_period_secs: u64,
    pub minimum_balance_threshold: u64,

    /// 0 disables periodic withdrawals
    pub withdrawal_period_secs: u64,
}

impl Default for BalanceCheckerSection {
    fn default() -> Self {
        Self {
            polling_period_secs: 60,
            minimum_balance_threshold: 0,
            withdrawal_period_secs: 24 * 60 * 60,
        }
    }
}

/// Deployment monitor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_interval_ms: u64,
    pub poll_jitter_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            poll_jitter_ms: 2_000,
            max_retries: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// A node of the reference cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub allocatable: ResourceUnits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    pub nodes: Vec<NodeConfig>,
}

impl Default for ClusterSection {
    fn default() -> Self {
        let nodes = MemoryClusterConfig::default()
            .nodes
            .into_iter()
            .map(|n| NodeConfig {
                name: n.name,
                allocatable: n.allocatable,
            })
            .collect();
        Self { nodes }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `LESSOR__` variables
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `LESSOR__PROVIDER__MANIFEST_TIMEOUT_SECS=600`.
    pub fn load(path: Option<&str>) -> DaemonResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LESSOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: DaemonConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> DaemonResult<()> {
        self.commit_levels()
            .validate()
            .map_err(|e| DaemonError::Config(e.to_string()))?;

        let periods = [
            ("provider.cluster_wait_ready_secs", self.provider.cluster_wait_ready_secs),
            ("provider.inventory_poll_period_secs", self.provider.inventory_poll_period_secs),
            ("provider.manifest_timeout_secs", self.provider.manifest_timeout_secs),
            ("bidengine.bid_timeout_ms", self.bidengine.bid_timeout_ms),
            ("balance_checker.polling_period_secs", self.balance_checker.polling_period_secs),
            ("monitor.poll_interval_ms", self.monitor.poll_interval_ms),
            ("monitor.initial_backoff_ms", self.monitor.initial_backoff_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, value)| *value == 0) {
            return Err(DaemonError::Config(format!("{name} must be greater than zero")));
        }

        if self.monitor.max_retries == 0 {
            return Err(DaemonError::Config(
                "monitor.max_retries must be at least 1".to_string(),
            ));
        }
        if self.monitor.max_backoff_ms < self.monitor.initial_backoff_ms {
            return Err(DaemonError::Config(
                "monitor.max_backoff_ms must not be below monitor.initial_backoff_ms".to_string(),
            ));
        }
        let multiplier = self.monitor.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(DaemonError::Config(format!(
                "monitor.backoff_multiplier must be a finite value >= 1, got {multiplier}"
            )));
        }

        if self.cluster.nodes.is_empty() {
            return Err(DaemonError::Config("cluster.nodes must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn commit_levels(&self) -> CommitLevels {
        CommitLevels {
            cpu: self.bidengine.cpu_commit_level,
            memory: self.bidengine.memory_commit_level,
            storage: self.bidengine.storage_commit_level,
        }
    }

    pub fn bid_engine_config(&self) -> BidEngineConfig {
        let section = &self.bidengine;
        BidEngineConfig {
            pricing: section.pricing.clone(),
            deposit: section.deposit.clone(),
            cpu_commit_level: section.cpu_commit_level,
            memory_commit_level: section.memory_commit_level,
            storage_commit_level: section.storage_commit_level,
            blocked_hostnames: section.blocked_hostnames.clone(),
            deployment_ingress_static_hosts: section.deployment_ingress_static_hosts,
            bid_timeout: Duration::from_millis(section.bid_timeout_ms),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let section = &self.monitor;
        MonitorConfig {
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            poll_jitter: Duration::from_millis(section.poll_jitter_ms),
            retry: RetryConfig {
                max_retries: section.max_retries,
                initial_backoff: Duration::from_millis(section.initial_backoff_ms),
                max_backoff: Duration::from_millis(section.max_backoff_ms),
                multiplier: section.backoff_multiplier,
            },
        }
    }

    pub fn balance_checker_config(&self) -> BalanceCheckerConfig {
        let section = &self.balance_checker;
        BalanceCheckerConfig {
            polling_period: Duration::from_secs(section.polling_period_secs),
            minimum_balance_threshold: section.minimum_balance_threshold,
            withdrawal_period: Duration::from_secs(section.withdrawal_period_secs),
        }
    }

    pub fn cluster_config(&self) -> MemoryClusterConfig {
        MemoryClusterConfig {
            nodes: self
                .cluster
                .nodes
                .iter()
                .map(|n| NodeInventory::new(n.name.clone(), n.allocatable))
                .collect(),
            forwarded_host: self
                .provider
                .public_hostname
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            external_port_base: self.provider.external_port_base,
            external_port_quantity: self.provider.external_port_quantity,
            ..MemoryClusterConfig::default()
        }
    }

    pub fn cluster_wait_ready(&self) -> Duration {
        Duration::from_secs(self.provider.cluster_wait_ready_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.manifest_timeout_secs)
    }

    pub fn inventory_poll_period(&self) -> Duration {
        Duration::from_secs(self.provider.inventory_poll_period_secs)
    }
}
