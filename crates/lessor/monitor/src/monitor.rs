//! Per-lease deployment monitor
//!
//! A monitor starts in [`MonitorState::Initializing`], polls immediately, and
//! then moves between `Pending` and `Deployed` as observations change. It
//! reaches `Failed` when polling keeps failing past the retry budget, and
//! `Closed` only through [`MonitorHandle::shutdown`].

use crate::config::MonitorConfig;
use lessor_cluster::ClusterClient;
use lessor_events::EventBus;
use lessor_types::{
    ClusterDeployment, ClusterDeploymentStatus, EventSource, ForwardedPortStatus, LeaseId,
    LeaseStatus, ManifestGroup, ProviderEvent,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorState {
    Initializing,
    Pending,
    Deployed,
    Failed,
    Closed,
}

impl From<ClusterDeploymentStatus> for MonitorState {
    fn from(status: ClusterDeploymentStatus) -> Self {
        match status {
            ClusterDeploymentStatus::Pending => MonitorState::Pending,
            ClusterDeploymentStatus::Deployed => MonitorState::Deployed,
            ClusterDeploymentStatus::Failed => MonitorState::Failed,
        }
    }
}

/// Result of comparing observed state with the desired manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedStatus {
    pub status: ClusterDeploymentStatus,

    /// Available replicas summed over the manifest's services
    pub available: u32,

    /// Requested replicas summed over the manifest's services
    pub total: u32,
}

/// Derive a lease's deployment status from one observation
///
/// Services the backend does not report count with their desired replica
/// count as `total` and zero available. Forwarded ports never influence the
/// result.
pub fn derive_status(group: &ManifestGroup, observed: Option<&LeaseStatus>) -> DerivedStatus {
    let mut available: u32 = 0;
    let mut total: u32 = 0;
    let mut ready = observed.is_some();

    for svc in &group.services {
        match observed.and_then(|o| o.services.get(&svc.name)) {
            Some(status) => {
                available = available.saturating_add(status.available);
                total = total.saturating_add(status.total);
                ready &= status.is_ready();
            }
            None => {
                total = total.saturating_add(svc.count);
                ready = false;
            }
        }
    }

    let status = if ready {
        ClusterDeploymentStatus::Deployed
    } else {
        ClusterDeploymentStatus::Pending
    };

    DerivedStatus {
        status,
        available,
        total,
    }
}

/// Handle to a running monitor
pub struct MonitorHandle {
    lease_id: LeaseId,
    group: String,
    state: Arc<watch::Sender<MonitorState>>,
    shutdown: watch::Sender<bool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MonitorHandle {
    pub fn lease_id(&self) -> &LeaseId {
        &self.lease_id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn watch_state(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    /// Stop polling and publishing, cancelling any in-flight poll
    ///
    /// Idempotent. Returns once the monitor task has exited, also for
    /// callers racing an in-progress shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        // Held across the join so concurrent callers wait for it
        let mut task = self.task.lock().await;
        if let Some(running) = task.as_mut() {
            if let Err(e) = running.await {
                warn!(lease_id = %self.lease_id, error = %e, "Monitor task ended abnormally");
            }
            *task = None;
            self.state.send_replace(MonitorState::Closed);
            debug!(lease_id = %self.lease_id, "Monitor closed");
        }
    }
}

/// Polls one lease and publishes its status changes
pub struct DeploymentMonitor {
    lease_id: LeaseId,
    group: ManifestGroup,
    client: Arc<dyn ClusterClient>,
    bus: EventBus,
    config: MonitorConfig,
    state: Arc<watch::Sender<MonitorState>>,
    shutdown: watch::Receiver<bool>,

    last_published: Option<ClusterDeploymentStatus>,
    last_counts: (u32, u32),
    last_ports: BTreeMap<String, Vec<ForwardedPortStatus>>,
    failures: u32,
}

impl DeploymentMonitor {
    /// Start monitoring a lease; the first poll runs immediately
    pub fn spawn(
        lease_id: LeaseId,
        group: ManifestGroup,
        client: Arc<dyn ClusterClient>,
        bus: EventBus,
        config: MonitorConfig,
    ) -> MonitorHandle {
        let (state_tx, _) = watch::channel(MonitorState::Initializing);
        let state = Arc::new(state_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let group_name = group.name.clone();

        let monitor = Self {
            lease_id: lease_id.clone(),
            group,
            client,
            bus,
            config,
            state: state.clone(),
            shutdown: shutdown_rx,
            last_published: None,
            last_counts: (0, 0),
            last_ports: BTreeMap::new(),
            failures: 0,
        };

        info!(lease_id = %lease_id, group = %group_name, "Starting deployment monitor");
        let task = tokio::spawn(monitor.run());

        MonitorHandle {
            lease_id,
            group: group_name,
            state,
            shutdown: shutdown_tx,
            task: tokio::sync::Mutex::new(Some(task)),
        }
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn next_interval(&self) -> Duration {
        let jitter_ms = u64::try_from(self.config.poll_jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.config.poll_interval + Duration::from_millis(extra)
    }

    async fn run(mut self) {
        let mut delay = Duration::ZERO;

        loop {
            if self.stopping() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                result = self.client.lease_status(&self.lease_id) => result,
            };

            // Results landing after shutdown are discarded
            if self.stopping() {
                break;
            }

            match result {
                Ok(observed) => {
                    if self.failures > 0 {
                        info!(
                            lease_id = %self.lease_id,
                            failures = self.failures,
                            "Status poll recovered"
                        );
                    }
                    self.failures = 0;
                    self.observe(observed);
                    delay = self.next_interval();
                }
                Err(e) => {
                    self.failures += 1;
                    if self.failures > self.config.retry.max_retries {
                        warn!(
                            lease_id = %self.lease_id,
                            failures = self.failures,
                            error = %e,
                            "Status polling exhausted retries, marking lease failed"
                        );
                        let (available, total) = self.last_counts;
                        self.publish(ClusterDeploymentStatus::Failed, available, total);
                        self.state.send_replace(MonitorState::Failed);
                        return;
                    }

                    delay = self.config.retry.backoff(self.failures);
                    warn!(
                        lease_id = %self.lease_id,
                        failures = self.failures,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Status poll failed, retrying"
                    );
                }
            }
        }

        debug!(lease_id = %self.lease_id, "Monitor loop stopped");
    }

    fn observe(&mut self, observed: Option<LeaseStatus>) {
        let derived = derive_status(&self.group, observed.as_ref());
        debug!(
            lease_id = %self.lease_id,
            status = %derived.status,
            available = derived.available,
            total = derived.total,
            "Polled lease status"
        );

        self.last_counts = (derived.available, derived.total);
        self.last_ports = observed.map(|o| o.forwarded_ports).unwrap_or_default();
        self.state.send_replace(derived.status.into());
        self.publish(derived.status, derived.available, derived.total);
    }

    fn publish(&mut self, status: ClusterDeploymentStatus, available: u32, total: u32) {
        if self.last_published == Some(status) {
            return;
        }

        info!(
            lease_id = %self.lease_id,
            from = ?self.last_published,
            to = %status,
            "Deployment status changed"
        );
        self.last_published = Some(status);

        self.bus.emit(
            ProviderEvent::ClusterDeployment(ClusterDeployment {
                lease_id: self.lease_id.clone(),
                group: self.group.name.clone(),
                status,
                available,
                total,
                forwarded_ports: self.last_ports.clone(),
            }),
            EventSource::Monitor,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use lessor_cluster::MemoryClusterClient;
    use lessor_events::Subscription;
    use lessor_types::{EventEnvelope, ResourceUnits, Service, ServiceExpose, ServiceStatus};
    use proptest::prelude::*;
    use tokio::time::timeout;

    fn lease() -> LeaseId {
        LeaseId::new("tenant", 7, 1, "provider")
    }

    fn group() -> ManifestGroup {
        ManifestGroup::new("app")
            .with_service(
                Service::new("web", "nginx", 2)
                    .with_resources(ResourceUnits::new(100, 1 << 20, 0))
                    .with_expose(ServiceExpose::new(80).global()),
            )
            .with_service(Service::new("worker", "busybox", 1))
    }

    fn test_config(max_retries: u32) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(1),
            poll_jitter: Duration::ZERO,
            retry: RetryConfig {
                max_retries,
                initial_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_secs(1),
                multiplier: 2.0,
            },
        }
    }

    fn deployment(envelope: EventEnvelope) -> ClusterDeployment {
        match envelope.event {
            ProviderEvent::ClusterDeployment(d) => d,
            other => panic!("unexpected event {other:?}"),
        }
    }

    async fn next_deployment(sub: &mut Subscription) -> ClusterDeployment {
        let envelope = timeout(Duration::from_secs(30), sub.recv())
            .await
            .expect("timed out waiting for event")
            .expect("bus closed");
        deployment(envelope)
    }

    async fn assert_quiet(sub: &mut Subscription) {
        assert!(timeout(Duration::from_secs(10), sub.recv()).await.is_err());
    }

    fn pending_status() -> LeaseStatus {
        LeaseStatus::default()
            .with_service(ServiceStatus::new("web", 1, 2))
            .with_service(ServiceStatus::new("worker", 1, 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_deployed_without_duplicates() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();

        client.deploy(&id, &group()).await.unwrap();
        client.set_status_override(&id, Some(pending_status()));

        let handle = DeploymentMonitor::spawn(id.clone(), group(), client.clone(), bus, test_config(3));

        let first = next_deployment(&mut sub).await;
        assert_eq!(first.status, ClusterDeploymentStatus::Pending);
        assert_eq!((first.available, first.total), (2, 3));
        assert_eq!(handle.state(), MonitorState::Pending);

        // Unchanged observations publish nothing
        assert_quiet(&mut sub).await;

        client.clear_status_override(&id);
        let second = next_deployment(&mut sub).await;
        assert_eq!(second.status, ClusterDeploymentStatus::Deployed);
        assert_eq!((second.available, second.total), (3, 3));
        assert_eq!(second.forwarded_ports["web"].len(), 1);
        assert_eq!(handle.state(), MonitorState::Deployed);

        assert_quiet(&mut sub).await;
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_lease_is_pending() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        let handle = DeploymentMonitor::spawn(lease(), group(), client, bus, test_config(3));
        let event = next_deployment(&mut sub).await;
        assert_eq!(event.status, ClusterDeploymentStatus::Pending);
        assert_eq!(event.available, 0);
        assert_eq!(event.total, 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_service_manifest_deploys_when_present() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        let empty = ManifestGroup::new("empty");
        client.deploy(&id, &empty).await.unwrap();

        let handle = DeploymentMonitor::spawn(id, empty, client, bus, test_config(3));
        let event = next_deployment(&mut sub).await;
        assert_eq!(event.status, ClusterDeploymentStatus::Deployed);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        client.deploy(&id, &group()).await.unwrap();
        client.inject_poll_failures(&id, 2);

        let handle = DeploymentMonitor::spawn(id, group(), client, bus, test_config(3));
        let event = next_deployment(&mut sub).await;
        assert_eq!(event.status, ClusterDeploymentStatus::Deployed);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_counts_retries_not_failures() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        client.deploy(&id, &group()).await.unwrap();

        // First poll plus three retries, the last of which succeeds
        client.inject_poll_failures(&id, 3);
        let handle = DeploymentMonitor::spawn(id.clone(), group(), client.clone(), bus.clone(), test_config(3));
        assert_eq!(
            next_deployment(&mut sub).await.status,
            ClusterDeploymentStatus::Deployed
        );
        handle.shutdown().await;

        // One more failure than that exhausts the budget
        client.inject_poll_failures(&id, 4);
        let handle = DeploymentMonitor::spawn(id, group(), client, bus, test_config(3));
        assert_eq!(
            next_deployment(&mut sub).await.status,
            ClusterDeploymentStatus::Failed
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_the_lease() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        client.deploy(&id, &group()).await.unwrap();

        let handle = DeploymentMonitor::spawn(id.clone(), group(), client.clone(), bus.clone(), test_config(3));
        assert_eq!(
            next_deployment(&mut sub).await.status,
            ClusterDeploymentStatus::Deployed
        );

        client.inject_poll_failures(&id, 100);
        let failed = next_deployment(&mut sub).await;
        assert_eq!(failed.status, ClusterDeploymentStatus::Failed);
        assert_eq!((failed.available, failed.total), (3, 3));

        let mut state = handle.watch_state();
        state
            .wait_for(|s| *s == MonitorState::Failed)
            .await
            .unwrap();

        // Polling has stopped
        client.clear_status_override(&id);
        assert_quiet(&mut sub).await;

        handle.shutdown().await;
        assert_eq!(handle.state(), MonitorState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent_and_silent() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        client.deploy(&id, &group()).await.unwrap();

        let handle = DeploymentMonitor::spawn(id.clone(), group(), client.clone(), bus.clone(), test_config(3));
        next_deployment(&mut sub).await;

        handle.shutdown().await;
        handle.shutdown().await;
        assert_eq!(handle.state(), MonitorState::Closed);

        client.set_status_override(&id, Some(pending_status()));
        assert_quiet(&mut sub).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_shutdowns_both_wait_for_exit() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let id = lease();
        client.deploy(&id, &group()).await.unwrap();

        let handle = DeploymentMonitor::spawn(id, group(), client, bus, test_config(3));
        next_deployment(&mut sub).await;

        let (first, second) = tokio::join!(
            async {
                handle.shutdown().await;
                handle.state()
            },
            async {
                handle.shutdown().await;
                handle.state()
            }
        );
        assert_eq!(first, MonitorState::Closed);
        assert_eq!(second, MonitorState::Closed);
    }

    fn arb_group_and_status() -> impl Strategy<Value = (ManifestGroup, LeaseStatus)> {
        prop::collection::vec((0u32..4, 0u32..5, 0u32..5, any::<bool>()), 0..5).prop_map(
            |specs| {
                let mut group = ManifestGroup::new("g");
                let mut status = LeaseStatus::default();
                for (i, (count, available, total, reported)) in specs.into_iter().enumerate() {
                    let name = format!("svc{i}");
                    group = group.with_service(Service::new(name.clone(), "img", count));
                    if reported {
                        status = status.with_service(ServiceStatus::new(name, available, total));
                    }
                }
                (group, status)
            },
        )
    }

    proptest! {
        #[test]
        fn prop_deployed_iff_every_service_ready((group, status) in arb_group_and_status()) {
            let derived = derive_status(&group, Some(&status));
            let expected = group.services.iter().all(|svc| {
                status
                    .services
                    .get(&svc.name)
                    .map(|s| s.total > 0 && s.available >= s.total)
                    .unwrap_or(false)
            });
            prop_assert_eq!(derived.status == ClusterDeploymentStatus::Deployed, expected);
        }

        #[test]
        fn prop_not_found_is_pending((group, _status) in arb_group_and_status()) {
            let derived = derive_status(&group, None);
            prop_assert_eq!(derived.status, ClusterDeploymentStatus::Pending);
            prop_assert_eq!(derived.available, 0);
        }
    }
}
