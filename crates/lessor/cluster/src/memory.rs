//! In-memory reference cluster backend
//!
//! Leases "run" as soon as they are deployed. Suitable for development and
//! testing; real deployments plug an orchestrator adapter in behind
//! [`ClusterClient`].

use crate::client::{
    ClusterClient, DeploymentRecord, EventWatcher, ExecRequest, ExecResult, LogLine, LogStream,
    StreamReceiver,
};
use crate::error::{ClusterError, ClusterResult, ExecError};
use async_trait::async_trait;
use lessor_types::{
    ForwardedPortStatus, Inventory, LeaseEvent, LeaseId, LeaseStatus, ManifestGroup,
    NodeInventory, ResourceUnits, Service, ServiceExpose, ServiceStatus,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

/// Configuration for [`MemoryClusterClient`]
#[derive(Debug, Clone)]
pub struct MemoryClusterConfig {
    /// Nodes whose capacity is reported by `inventory()`
    pub nodes: Vec<NodeInventory>,

    /// Host reported in forwarded port status
    pub forwarded_host: String,

    /// First port of the external port pool
    pub external_port_base: u16,

    /// Size of the external port pool
    pub external_port_quantity: u16,

    /// Delay between synthesized events when following
    pub event_interval: Duration,

    /// Random extra delay added to `event_interval`
    pub event_jitter: Duration,
}

impl Default for MemoryClusterConfig {
    fn default() -> Self {
        Self {
            nodes: vec![NodeInventory::new(
                "node-0",
                ResourceUnits::new(8_000, 16 << 30, 100 << 30).with_endpoints(100),
            )],
            forwarded_host: "localhost".to_string(),
            external_port_base: 30_000,
            external_port_quantity: 1_000,
            event_interval: Duration::from_secs(5),
            event_jitter: Duration::from_secs(1),
        }
    }
}

struct LeaseEntry {
    group: ManifestGroup,
    forwarded_ports: BTreeMap<String, Vec<ForwardedPortStatus>>,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    leases: HashMap<LeaseId, LeaseEntry>,
    free_ports: BTreeSet<u16>,
    status_overrides: HashMap<LeaseId, Option<LeaseStatus>>,
    injected_failures: HashMap<LeaseId, u32>,
}

impl State {
    fn release_ports(&mut self, ports: &BTreeMap<String, Vec<ForwardedPortStatus>>) {
        for port in ports.values().flatten() {
            self.free_ports.insert(port.external_port);
        }
    }

    fn observed(&self, lease_id: &LeaseId) -> Option<LeaseStatus> {
        if let Some(forced) = self.status_overrides.get(lease_id) {
            return forced.clone();
        }
        self.leases.get(lease_id).map(running_status)
    }
}

/// Every service reports all of its replicas available
fn running_status(entry: &LeaseEntry) -> LeaseStatus {
    let services = entry
        .group
        .services
        .iter()
        .map(|svc| {
            let mut status = ServiceStatus::new(svc.name.clone(), svc.count, svc.count);
            status.replicas = Some(svc.count);
            status.ready_replicas = Some(svc.count);
            status.available_replicas = Some(svc.count);
            status.uris = svc
                .expose
                .iter()
                .flat_map(|e| e.hosts.iter().cloned())
                .collect();
            (svc.name.clone(), status)
        })
        .collect();

    LeaseStatus {
        services,
        forwarded_ports: entry.forwarded_ports.clone(),
    }
}

/// In-memory cluster backend guarded by a single mutex
pub struct MemoryClusterClient {
    config: MemoryClusterConfig,
    state: Mutex<State>,
}

impl MemoryClusterClient {
    pub fn new(config: MemoryClusterConfig) -> Self {
        let end = u32::from(config.external_port_base) + u32::from(config.external_port_quantity);
        let free_ports = (u32::from(config.external_port_base)..end.min(u32::from(u16::MAX) + 1))
            .filter_map(|p| u16::try_from(p).ok())
            .collect();

        Self {
            config,
            state: Mutex::new(State {
                free_ports,
                ..Default::default()
            }),
        }
    }

    /// Force `lease_status` to return `status` until cleared or torn down
    pub fn set_status_override(&self, lease_id: &LeaseId, status: Option<LeaseStatus>) {
        self.state
            .lock()
            .status_overrides
            .insert(lease_id.clone(), status);
    }

    pub fn clear_status_override(&self, lease_id: &LeaseId) {
        self.state.lock().status_overrides.remove(lease_id);
    }

    /// Make the next `count` status polls for a lease fail
    pub fn inject_poll_failures(&self, lease_id: &LeaseId, count: u32) {
        self.state
            .lock()
            .injected_failures
            .insert(lease_id.clone(), count);
    }

    pub fn lease_count(&self) -> usize {
        self.state.lock().leases.len()
    }

    pub fn free_port_count(&self) -> usize {
        self.state.lock().free_ports.len()
    }

    fn group_of(&self, lease_id: &LeaseId) -> ClusterResult<(ManifestGroup, watch::Receiver<bool>)> {
        let state = self.state.lock();
        let entry = state
            .leases
            .get(lease_id)
            .ok_or_else(|| ClusterError::LeaseNotFound(lease_id.clone()))?;
        Ok((entry.group.clone(), entry.cancel.subscribe()))
    }

    fn filter_services(
        lease_id: &LeaseId,
        group: &ManifestGroup,
        service: Option<&str>,
    ) -> ClusterResult<Vec<String>> {
        match service {
            Some(name) if group.service(name).is_none() => Err(ClusterError::NoSuchService {
                lease_id: lease_id.clone(),
                service: name.to_string(),
            }),
            Some(name) => Ok(vec![name.to_string()]),
            None => Ok(group.services.iter().map(|s| s.name.clone()).collect()),
        }
    }

    fn spawn_follower<T, F>(
        &self,
        tx: mpsc::Sender<T>,
        mut cancel: watch::Receiver<bool>,
        mut produce: F,
    ) where
        T: Send + 'static,
        F: FnMut(u64) -> Vec<T> + Send + 'static,
    {
        let interval = self.config.event_interval;
        let jitter_ms = u64::try_from(self.config.event_jitter.as_millis()).unwrap_or(u64::MAX);

        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut tick: u64 = 0;
            loop {
                if *cancel.borrow() {
                    break;
                }
                let delay = jittered(interval, jitter_ms, &mut rng);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                tick += 1;
                for item in produce(tick) {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            }
        });
    }
}

impl Default for MemoryClusterClient {
    fn default() -> Self {
        Self::new(MemoryClusterConfig::default())
    }
}

fn jittered(interval: Duration, jitter_ms: u64, rng: &mut impl Rng) -> Duration {
    if jitter_ms == 0 {
        return interval;
    }
    interval + Duration::from_millis(rng.gen_range(0..=jitter_ms))
}

fn lease_event(service: &str, reason: &str, note: String) -> LeaseEvent {
    LeaseEvent {
        event_type: "Normal".to_string(),
        reason: reason.to_string(),
        note,
        object_kind: "Pod".to_string(),
        object_name: service.to_string(),
        timestamp: chrono::Utc::now(),
    }
}

#[async_trait]
impl ClusterClient for MemoryClusterClient {
    #[instrument(skip(self, group), fields(lease_id = %lease_id, group = %group.name))]
    async fn deploy(&self, lease_id: &LeaseId, group: &ManifestGroup) -> ClusterResult<()> {
        let mut state = self.state.lock();

        let globals: Vec<(&Service, &ServiceExpose)> = group
            .services
            .iter()
            .flat_map(|svc| svc.expose.iter().filter(|e| e.global).map(move |e| (svc, e)))
            .collect();

        // Ports this lease may use: the free pool plus what a redeploy gives back
        let mut usable = state.free_ports.clone();
        if let Some(entry) = state.leases.get(lease_id) {
            usable.extend(entry.forwarded_ports.values().flatten().map(|p| p.external_port));
        }

        for (_, expose) in globals.iter().filter(|(_, e)| e.external_port != 0) {
            if !usable.remove(&expose.external_port) {
                return Err(ClusterError::InsufficientCapacity(format!(
                    "external port {} is not available",
                    expose.external_port
                )));
            }
        }
        let needed = globals.iter().filter(|(_, e)| e.external_port == 0).count();
        if needed > usable.len() {
            return Err(ClusterError::InsufficientCapacity(format!(
                "{needed} external ports requested, {} free",
                usable.len()
            )));
        }

        // Followers of a redeployed lease stay attached
        let cancel = match state.leases.remove(lease_id) {
            Some(entry) => {
                state.release_ports(&entry.forwarded_ports);
                entry.cancel
            }
            None => watch::channel(false).0,
        };

        // Pinned ports are claimed first so the automatic ones cannot take them
        let mut assigned = Vec::with_capacity(globals.len());
        for (svc, expose) in &globals {
            if expose.external_port != 0 {
                state.free_ports.remove(&expose.external_port);
                assigned.push((*svc, *expose, expose.external_port));
            }
        }
        for (svc, expose) in &globals {
            if expose.external_port == 0 {
                let Some(external_port) = state.free_ports.pop_first() else {
                    return Err(ClusterError::Internal("port pool drained".into()));
                };
                assigned.push((*svc, *expose, external_port));
            }
        }

        let mut forwarded_ports: BTreeMap<String, Vec<ForwardedPortStatus>> = BTreeMap::new();
        for (svc, expose, external_port) in assigned {
            forwarded_ports
                .entry(svc.name.clone())
                .or_default()
                .push(ForwardedPortStatus {
                    host: self.config.forwarded_host.clone(),
                    port: expose.port,
                    external_port,
                    proto: expose.proto,
                    name: svc.name.clone(),
                    available: svc.count,
                });
        }
        for ports in forwarded_ports.values_mut() {
            ports.sort_by_key(|p| p.port);
        }

        state.leases.insert(
            lease_id.clone(),
            LeaseEntry {
                group: group.clone(),
                forwarded_ports,
                cancel,
            },
        );

        info!(services = group.services.len(), "Lease deployed");
        Ok(())
    }

    #[instrument(skip(self), fields(lease_id = %lease_id))]
    async fn teardown_lease(&self, lease_id: &LeaseId) -> ClusterResult<()> {
        let mut state = self.state.lock();
        state.status_overrides.remove(lease_id);
        state.injected_failures.remove(lease_id);

        if let Some(entry) = state.leases.remove(lease_id) {
            state.release_ports(&entry.forwarded_ports);
            let _ = entry.cancel.send(true);
            info!("Lease torn down");
        } else {
            debug!("Teardown of unknown lease");
        }
        Ok(())
    }

    async fn lease_status(&self, lease_id: &LeaseId) -> ClusterResult<Option<LeaseStatus>> {
        let mut state = self.state.lock();

        if let Some(remaining) = state.injected_failures.get_mut(lease_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClusterError::Unavailable("injected poll failure".into()));
            }
        }

        Ok(state.observed(lease_id))
    }

    async fn lease_events(
        &self,
        lease_id: &LeaseId,
        service: Option<&str>,
        follow: bool,
    ) -> ClusterResult<EventWatcher> {
        let (group, cancel) = self.group_of(lease_id)?;
        let services = Self::filter_services(lease_id, &group, service)?;

        let batch: Vec<LeaseEvent> = services
            .iter()
            .flat_map(|name| {
                let image = group
                    .service(name)
                    .map(|s| s.image.clone())
                    .unwrap_or_default();
                [
                    lease_event(name, "Scheduled", format!("assigned {name} to a node")),
                    lease_event(name, "Pulled", format!("image {image} present")),
                    lease_event(name, "Started", format!("started container {name}")),
                ]
            })
            .collect();

        let (tx, rx) = mpsc::channel(batch.len().max(16));
        for event in batch {
            // capacity covers the batch
            let _ = tx.try_send(event);
        }

        if follow {
            self.spawn_follower(tx, cancel, move |tick| {
                services
                    .iter()
                    .map(|name| lease_event(name, "Running", format!("heartbeat {tick}")))
                    .collect()
            });
        }

        Ok(StreamReceiver::new(rx))
    }

    async fn lease_logs(
        &self,
        lease_id: &LeaseId,
        service: Option<&str>,
        follow: bool,
        tail_lines: Option<usize>,
    ) -> ClusterResult<LogStream> {
        let (group, cancel) = self.group_of(lease_id)?;
        let services = Self::filter_services(lease_id, &group, service)?;

        let mut lines: Vec<LogLine> = Vec::new();
        for name in &services {
            let pods = group.service(name).map(|s| s.count).unwrap_or(0);
            for pod in 0..pods {
                lines.push(LogLine {
                    service: name.clone(),
                    pod,
                    line: format!("{name}-{pod} started"),
                });
            }
        }
        if let Some(tail) = tail_lines {
            let skip = lines.len().saturating_sub(tail);
            lines.drain(..skip);
        }

        let (tx, rx) = mpsc::channel(lines.len().max(16));
        for line in lines {
            let _ = tx.try_send(line);
        }

        if follow {
            self.spawn_follower(tx, cancel, move |tick| {
                services
                    .iter()
                    .map(|name| LogLine {
                        service: name.clone(),
                        pod: 0,
                        line: format!("{name}-0 alive ({tick})"),
                    })
                    .collect()
            });
        }

        Ok(StreamReceiver::new(rx))
    }

    async fn service_status(
        &self,
        lease_id: &LeaseId,
        service: &str,
    ) -> ClusterResult<ServiceStatus> {
        let state = self.state.lock();
        let status = state
            .observed(lease_id)
            .ok_or_else(|| ClusterError::LeaseNotFound(lease_id.clone()))?;

        status
            .services
            .get(service)
            .cloned()
            .ok_or_else(|| ClusterError::NoSuchService {
                lease_id: lease_id.clone(),
                service: service.to_string(),
            })
    }

    async fn deployments(&self) -> ClusterResult<Vec<DeploymentRecord>> {
        let state = self.state.lock();
        let mut records: Vec<DeploymentRecord> = state
            .leases
            .iter()
            .map(|(lease_id, entry)| DeploymentRecord {
                lease_id: lease_id.clone(),
                group: entry.group.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.lease_id.cmp(&b.lease_id));
        Ok(records)
    }

    async fn inventory(&self) -> ClusterResult<Inventory> {
        let state = self.state.lock();

        let mut remaining = state.leases.values().fold(ResourceUnits::default(), |acc, e| {
            let used = e
                .group
                .services
                .iter()
                .fold(ResourceUnits::default(), |acc, svc| {
                    let per = svc
                        .resources
                        .checked_mul(svc.count)
                        .unwrap_or(ResourceUnits::new(u64::MAX, u64::MAX, u64::MAX));
                    acc.saturating_add(&per)
                });
            acc.saturating_add(&used)
        });

        // Usage is charged against nodes in order
        let nodes = self
            .config
            .nodes
            .iter()
            .map(|node| {
                let available = node.allocatable.saturating_sub(&remaining);
                let consumed = node.allocatable.saturating_sub(&available);
                remaining = remaining.saturating_sub(&consumed);
                NodeInventory {
                    name: node.name.clone(),
                    allocatable: node.allocatable,
                    available,
                }
            })
            .collect();

        Ok(Inventory { nodes })
    }

    #[instrument(skip(self, request), fields(lease_id = %request.lease_id, service = %request.service))]
    async fn exec(&self, mut request: ExecRequest) -> ClusterResult<ExecResult> {
        let pods = {
            let state = self.state.lock();
            let entry = state
                .leases
                .get(&request.lease_id)
                .ok_or_else(|| ClusterError::LeaseNotFound(request.lease_id.clone()))?;
            let svc = entry
                .group
                .service(&request.service)
                .ok_or_else(|| ExecError::NoSuchService(request.service.clone()))?;

            let status = state
                .observed(&request.lease_id)
                .ok_or(ExecError::DeploymentNotYetRunning)?;
            let running = status
                .services
                .get(&request.service)
                .map(|s| s.available)
                .unwrap_or(0);
            if running == 0 {
                return Err(ExecError::ServiceNotRunning(request.service.clone()).into());
            }
            svc.count
        };

        match request.pod_index {
            None if pods > 1 => {
                return Err(ExecError::MultiplePods {
                    service: request.service.clone(),
                    pods,
                }
                .into())
            }
            Some(index) if index >= pods => {
                return Err(ExecError::PodIndexOutOfRange {
                    service: request.service.clone(),
                    index,
                    pods,
                }
                .into())
            }
            _ => {}
        }

        let Some((program, args)) = request.cmd.split_first() else {
            return Err(ExecError::CommandExecutionFailed("empty command".into()).into());
        };

        let io_failed = |e: std::io::Error| ExecError::CommandExecutionFailed(e.to_string());

        let exit_code = match program.as_str() {
            "true" => 0,
            "false" => 1,
            "echo" => {
                if let Some(stdout) = request.stdout.as_mut() {
                    let line = format!("{}\n", args.join(" "));
                    stdout.write_all(line.as_bytes()).await.map_err(io_failed)?;
                    stdout.flush().await.map_err(io_failed)?;
                }
                0
            }
            "cat" => {
                let mut input = Vec::new();
                if let Some(stdin) = request.stdin.as_mut() {
                    stdin.read_to_end(&mut input).await.map_err(io_failed)?;
                }
                if let Some(stdout) = request.stdout.as_mut() {
                    stdout.write_all(&input).await.map_err(io_failed)?;
                    stdout.flush().await.map_err(io_failed)?;
                }
                0
            }
            other => return Err(ExecError::CommandDoesNotExist(other.to_string()).into()),
        };

        debug!(program = %program, exit_code, "Command finished");
        Ok(ExecResult { exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessor_types::{Service, ServiceExpose};

    fn lease(dseq: u64) -> LeaseId {
        LeaseId::new("tenant", dseq, 1, "provider")
    }

    fn web_group(count: u32) -> ManifestGroup {
        ManifestGroup::new("web").with_service(
            Service::new("web", "nginx", count)
                .with_resources(ResourceUnits::new(1000, 1 << 30, 0))
                .with_expose(ServiceExpose::new(80).global().with_host("example.com")),
        )
    }

    fn small_client() -> MemoryClusterClient {
        MemoryClusterClient::new(MemoryClusterConfig {
            nodes: vec![
                NodeInventory::new("a", ResourceUnits::new(2000, 4 << 30, 0)),
                NodeInventory::new("b", ResourceUnits::new(2000, 4 << 30, 0)),
            ],
            external_port_base: 40_000,
            external_port_quantity: 2,
            event_interval: Duration::from_millis(100),
            event_jitter: Duration::from_millis(10),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_deploy_reports_all_available() {
        let client = small_client();
        let id = lease(1);

        assert!(client.lease_status(&id).await.unwrap().is_none());
        client.deploy(&id, &web_group(2)).await.unwrap();

        let status = client.lease_status(&id).await.unwrap().unwrap();
        let web = &status.services["web"];
        assert_eq!(web.available, 2);
        assert_eq!(web.total, 2);

        let ports = &status.forwarded_ports["web"];
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].external_port, 40_000);
        assert_eq!(ports[0].port, 80);
    }

    #[tokio::test]
    async fn test_port_pool_exhaustion_and_release() {
        let client = small_client();
        client.deploy(&lease(1), &web_group(1)).await.unwrap();
        client.deploy(&lease(2), &web_group(1)).await.unwrap();
        assert_eq!(client.free_port_count(), 0);

        let err = client.deploy(&lease(3), &web_group(1)).await.unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientCapacity(_)));

        client.teardown_lease(&lease(1)).await.unwrap();
        assert_eq!(client.free_port_count(), 1);
        client.deploy(&lease(3), &web_group(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_redeploy_reuses_ports() {
        let client = small_client();
        client.deploy(&lease(1), &web_group(1)).await.unwrap();
        client.deploy(&lease(1), &web_group(3)).await.unwrap();
        assert_eq!(client.free_port_count(), 1);
        assert_eq!(client.lease_count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_unknown_is_noop() {
        let client = small_client();
        client.teardown_lease(&lease(9)).await.unwrap();
    }

    fn pinned_group(external_port: u16) -> ManifestGroup {
        ManifestGroup::new("web").with_service(
            Service::new("web", "nginx", 1)
                .with_resources(ResourceUnits::new(500, 1 << 30, 0))
                .with_expose(ServiceExpose::new(80).global().with_external_port(external_port)),
        )
    }

    #[tokio::test]
    async fn test_requested_external_port_is_honored() {
        let client = small_client();
        client.deploy(&lease(1), &pinned_group(40_001)).await.unwrap();

        let status = client.lease_status(&lease(1)).await.unwrap().unwrap();
        assert_eq!(status.forwarded_ports["web"][0].external_port, 40_001);

        // The automatic allocation skips the pinned port
        client.deploy(&lease(2), &web_group(1)).await.unwrap();
        let status = client.lease_status(&lease(2)).await.unwrap().unwrap();
        assert_eq!(status.forwarded_ports["web"][0].external_port, 40_000);
        assert_eq!(client.free_port_count(), 0);
    }

    #[tokio::test]
    async fn test_taken_external_port_rejected_without_side_effects() {
        let client = small_client();
        client.deploy(&lease(1), &pinned_group(40_000)).await.unwrap();

        let err = client.deploy(&lease(2), &pinned_group(40_000)).await.unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientCapacity(_)));
        let err = client.deploy(&lease(2), &pinned_group(9_999)).await.unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientCapacity(_)));

        // A failed redeploy keeps the running lease and its port
        let err = client.deploy(&lease(1), &pinned_group(9_999)).await.unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientCapacity(_)));
        let status = client.lease_status(&lease(1)).await.unwrap().unwrap();
        assert_eq!(status.forwarded_ports["web"][0].external_port, 40_000);
        assert_eq!(client.lease_count(), 1);
        assert_eq!(client.free_port_count(), 1);

        // Redeploying onto the port the lease already holds is fine
        client.deploy(&lease(1), &pinned_group(40_000)).await.unwrap();
        assert_eq!(client.free_port_count(), 1);
    }

    #[test]
    fn test_jitter_varies_between_events() {
        let mut rng = StdRng::seed_from_u64(7);
        let interval = Duration::from_millis(100);
        let delays: Vec<Duration> = (0..32).map(|_| jittered(interval, 50, &mut rng)).collect();

        assert!(delays.iter().all(|d| *d >= interval && *d <= interval + Duration::from_millis(50)));
        assert!(delays.windows(2).any(|w| w[0] != w[1]));
        assert_eq!(jittered(interval, 0, &mut rng), interval);
    }

    #[tokio::test]
    async fn test_inventory_accounts_usage_in_node_order() {
        let client = small_client();
        client.deploy(&lease(1), &web_group(3)).await.unwrap();

        let inventory = client.inventory().await.unwrap();
        assert_eq!(inventory.nodes[0].available.cpu_millis, 0);
        assert_eq!(inventory.nodes[1].available.cpu_millis, 1000);
        assert_eq!(inventory.total_available().cpu_millis, 1000);
    }

    #[tokio::test]
    async fn test_injected_failures_and_overrides() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(1)).await.unwrap();

        client.inject_poll_failures(&id, 2);
        assert!(client.lease_status(&id).await.is_err());
        assert!(client.lease_status(&id).await.is_err());
        assert!(client.lease_status(&id).await.unwrap().is_some());

        client.set_status_override(&id, None);
        assert!(client.lease_status(&id).await.unwrap().is_none());
        client.clear_status_override(&id);
        assert!(client.lease_status(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_events_without_follow_are_finite() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(1)).await.unwrap();

        let mut watcher = client.lease_events(&id, None, false).await.unwrap();
        let mut count = 0;
        while watcher.next().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);

        let err = client
            .lease_events(&id, Some("db"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::NoSuchService { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_followed_events_end_on_teardown() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(1)).await.unwrap();

        let mut watcher = client.lease_events(&id, Some("web"), true).await.unwrap();
        for _ in 0..3 {
            watcher.next().await.unwrap();
        }
        let heartbeat = watcher.next().await.unwrap();
        assert_eq!(heartbeat.reason, "Running");

        client.teardown_lease(&id).await.unwrap();
        while watcher.next().await.is_some() {}
    }

    #[tokio::test]
    async fn test_logs_tail() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(3)).await.unwrap();

        let mut logs = client.lease_logs(&id, None, false, Some(2)).await.unwrap();
        let first = logs.next().await.unwrap();
        assert_eq!(first.pod, 1);
        assert_eq!(logs.next().await.unwrap().pod, 2);
        assert!(logs.next().await.is_none());
    }

    #[tokio::test]
    async fn test_exec_echo_and_cat() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(1)).await.unwrap();

        let (out_writer, mut out_reader) = tokio::io::duplex(64);
        let request = ExecRequest::new(
            id.clone(),
            "web",
            vec!["echo".into(), "hello".into(), "world".into()],
        )
        .with_stdout(out_writer);
        let result = client.exec(request).await.unwrap();
        assert_eq!(result.exit_code, 0);

        let mut buf = vec![0u8; 12];
        out_reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello world\n");

        let (out_writer, mut out_reader) = tokio::io::duplex(64);
        let request = ExecRequest::new(id.clone(), "web", vec!["cat".into()])
            .with_stdin(&b"piped"[..])
            .with_stdout(out_writer);
        client.exec(request).await.unwrap();
        let mut buf = vec![0u8; 5];
        out_reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"piped");

        let result = client
            .exec(ExecRequest::new(id, "web", vec!["false".into()]))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_exec_errors() {
        let client = small_client();
        let id = lease(1);
        client.deploy(&id, &web_group(2)).await.unwrap();

        let err = client
            .exec(ExecRequest::new(id.clone(), "db", vec!["true".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Exec(ExecError::NoSuchService(_))));

        let err = client
            .exec(ExecRequest::new(id.clone(), "web", vec!["true".into()]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::MultiplePods { pods: 2, .. })
        ));

        let err = client
            .exec(ExecRequest::new(id.clone(), "web", vec!["true".into()]).with_pod_index(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::PodIndexOutOfRange { index: 2, .. })
        ));

        let err = client
            .exec(ExecRequest::new(id.clone(), "web", vec!["vim".into()]).with_pod_index(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::CommandDoesNotExist(_))
        ));

        let err = client
            .exec(ExecRequest::new(id.clone(), "web", vec![]).with_pod_index(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::CommandExecutionFailed(_))
        ));

        client.set_status_override(&id, None);
        let err = client
            .exec(ExecRequest::new(id.clone(), "web", vec!["true".into()]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::DeploymentNotYetRunning)
        ));

        client.set_status_override(
            &id,
            Some(LeaseStatus::default().with_service(ServiceStatus::new("web", 0, 2))),
        );
        let err = client
            .exec(ExecRequest::new(id, "web", vec!["true".into()]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Exec(ExecError::ServiceNotRunning(_))
        ));
    }
}
