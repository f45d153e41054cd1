//! Lease manager
//!
//! Tracks every lease the provider is responsible for: leases won and still
//! waiting for their manifest, and deployed leases with a live monitor.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::monitor::{DeploymentMonitor, MonitorHandle, MonitorState};
use dashmap::DashMap;
use futures::future::join_all;
use lessor_cluster::ClusterClient;
use lessor_events::EventBus;
use lessor_types::{LeaseId, ManifestGroup, MonitorCounts};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

pub struct LeaseManager {
    client: Arc<dyn ClusterClient>,
    bus: EventBus,
    config: MonitorConfig,
    manifest_timeout: Duration,

    monitors: DashMap<LeaseId, Arc<MonitorHandle>>,
    awaiting: Arc<DashMap<LeaseId, AbortHandle>>,
}

impl LeaseManager {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        bus: EventBus,
        config: MonitorConfig,
        manifest_timeout: Duration,
    ) -> Self {
        Self {
            client,
            bus,
            config,
            manifest_timeout,
            monitors: DashMap::new(),
            awaiting: Arc::new(DashMap::new()),
        }
    }

    /// Deploy a manifest and start monitoring the lease
    ///
    /// A lease that is already monitored has its monitor restarted against
    /// the new manifest.
    #[instrument(skip(self, group), fields(lease_id = %lease_id, group = %group.name))]
    pub async fn deploy(&self, lease_id: LeaseId, group: ManifestGroup) -> MonitorResult<()> {
        if let Some((_, timer)) = self.awaiting.remove(&lease_id) {
            timer.abort();
        }
        if let Some((_, previous)) = self.monitors.remove(&lease_id) {
            debug!("Replacing manifest of monitored lease");
            previous.shutdown().await;
        }

        self.client.deploy(&lease_id, &group).await?;
        self.start_monitor(lease_id, group);
        Ok(())
    }

    fn start_monitor(&self, lease_id: LeaseId, group: ManifestGroup) {
        let handle = DeploymentMonitor::spawn(
            lease_id.clone(),
            group,
            self.client.clone(),
            self.bus.clone(),
            self.config.clone(),
        );
        self.monitors.insert(lease_id, Arc::new(handle));
    }

    /// Record a won lease; it is torn down if no manifest arrives in time
    ///
    /// Returns false, and changes nothing, when the lease is already
    /// monitored.
    #[instrument(skip(self), fields(lease_id = %lease_id))]
    pub fn award(&self, lease_id: LeaseId) -> bool {
        if self.monitors.contains_key(&lease_id) {
            debug!("Award for a lease that is already deployed, ignoring");
            return false;
        }

        let awaiting = self.awaiting.clone();
        let client = self.client.clone();
        let timeout = self.manifest_timeout;
        let id = lease_id.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if awaiting.remove(&id).is_none() {
                return;
            }

            warn!(lease_id = %id, timeout_secs = timeout.as_secs(), "Manifest not received in time, dropping lease");
            if let Err(e) = client.teardown_lease(&id).await {
                warn!(lease_id = %id, error = %e, "Teardown after manifest timeout failed");
            }
        });

        if let Some(previous) = self.awaiting.insert(lease_id, task.abort_handle()) {
            previous.abort();
        }
        info!("Lease awarded, awaiting manifest");
        true
    }

    /// Accept the manifest for a lease and deploy it
    pub async fn submit_manifest(&self, lease_id: LeaseId, group: ManifestGroup) -> MonitorResult<()> {
        self.deploy(lease_id, group).await
    }

    /// Stop monitoring a lease and remove it from the cluster; idempotent
    #[instrument(skip(self), fields(lease_id = %lease_id))]
    pub async fn teardown(&self, lease_id: &LeaseId) -> MonitorResult<()> {
        if let Some((_, timer)) = self.awaiting.remove(lease_id) {
            timer.abort();
        }
        if let Some((_, monitor)) = self.monitors.remove(lease_id) {
            monitor.shutdown().await;
        }

        self.client.teardown_lease(lease_id).await?;
        info!("Lease torn down");
        Ok(())
    }

    /// Resume monitoring every lease the cluster still runs
    ///
    /// Returns the number of monitors started.
    pub async fn restore(&self) -> MonitorResult<usize> {
        let records = self.client.deployments().await?;
        let mut started = 0;

        for record in records {
            if self.monitors.contains_key(&record.lease_id) {
                continue;
            }
            debug!(lease_id = %record.lease_id, "Restoring monitor for running lease");
            self.start_monitor(record.lease_id, record.group);
            started += 1;
        }

        info!(restored = started, "Lease monitors restored");
        Ok(started)
    }

    /// Shut every monitor down concurrently and wait for all of them
    pub async fn shutdown_all(&self) {
        for entry in self.awaiting.iter() {
            entry.value().abort();
        }
        self.awaiting.clear();

        let ids: Vec<LeaseId> = self.monitors.iter().map(|e| e.key().clone()).collect();
        let handles: Vec<Arc<MonitorHandle>> = ids
            .iter()
            .filter_map(|id| self.monitors.remove(id).map(|(_, h)| h))
            .collect();

        let count = handles.len();
        join_all(handles.iter().map(|h| h.shutdown())).await;
        info!(monitors = count, "All lease monitors stopped");
    }

    pub fn monitor(&self, lease_id: &LeaseId) -> MonitorResult<Arc<MonitorHandle>> {
        self.monitors
            .get(lease_id)
            .map(|h| h.value().clone())
            .ok_or_else(|| MonitorError::NotMonitored(lease_id.clone()))
    }

    pub fn monitor_states(&self) -> Vec<(LeaseId, MonitorState)> {
        let mut states: Vec<_> = self
            .monitors
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn monitor_counts(&self) -> MonitorCounts {
        let mut counts = MonitorCounts::default();
        for entry in self.monitors.iter() {
            match entry.value().state() {
                MonitorState::Initializing | MonitorState::Pending => counts.pending += 1,
                MonitorState::Deployed => counts.deployed += 1,
                MonitorState::Failed => counts.failed += 1,
                MonitorState::Closed => {}
            }
        }
        counts
    }

    pub fn monitored_leases(&self) -> usize {
        self.monitors.len()
    }

    /// Leases won but still without a manifest
    pub fn awaiting_manifest(&self) -> usize {
        self.awaiting.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use lessor_cluster::MemoryClusterClient;
    use lessor_types::{ClusterDeploymentStatus, ProviderEvent, Service};
    use tokio::time::timeout;

    fn lease(dseq: u64) -> LeaseId {
        LeaseId::new("tenant", dseq, 1, "provider")
    }

    fn group(count: u32) -> ManifestGroup {
        ManifestGroup::new("app").with_service(Service::new("web", "nginx", count))
    }

    fn manager(client: Arc<MemoryClusterClient>, bus: EventBus) -> LeaseManager {
        let config = MonitorConfig {
            poll_interval: Duration::from_secs(1),
            poll_jitter: Duration::ZERO,
            retry: RetryConfig::default(),
        };
        LeaseManager::new(client, bus, config, Duration::from_secs(60))
    }

    async fn wait_for_state(manager: &LeaseManager, id: &LeaseId, want: MonitorState) {
        let handle = manager.monitor(id).unwrap();
        let mut state = handle.watch_state();
        timeout(Duration::from_secs(30), state.wait_for(|s| *s == want))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_and_teardown() {
        let client = Arc::new(MemoryClusterClient::default());
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let manager = manager(client.clone(), bus);
        let id = lease(1);

        manager.deploy(id.clone(), group(2)).await.unwrap();
        wait_for_state(&manager, &id, MonitorState::Deployed).await;

        let event = timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
        match event.event {
            ProviderEvent::ClusterDeployment(d) => {
                assert_eq!(d.lease_id, id);
                assert_eq!(d.status, ClusterDeploymentStatus::Deployed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(manager.monitor_counts().deployed, 1);

        let handle = manager.monitor(&id).unwrap();
        manager.teardown(&id).await.unwrap();
        assert_eq!(handle.state(), MonitorState::Closed);
        assert_eq!(manager.monitored_leases(), 0);
        assert_eq!(client.lease_count(), 0);

        manager.teardown(&id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeploy_restarts_monitor() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let id = lease(1);

        manager.deploy(id.clone(), group(1)).await.unwrap();
        let first = manager.monitor(&id).unwrap();
        manager.deploy(id.clone(), group(3)).await.unwrap();

        assert_eq!(first.state(), MonitorState::Closed);
        assert_eq!(manager.monitored_leases(), 1);
        wait_for_state(&manager, &id, MonitorState::Deployed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_award_of_deployed_lease_is_ignored() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let id = lease(1);

        manager.deploy(id.clone(), group(1)).await.unwrap();
        assert!(!manager.award(id.clone()));
        assert_eq!(manager.awaiting_manifest(), 0);

        // Past the manifest timeout the running lease is untouched
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(client.lease_count(), 1);
        assert_eq!(manager.monitored_leases(), 1);
        wait_for_state(&manager, &id, MonitorState::Deployed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_deploy_cancels_manifest_timer() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let id = lease(1);

        assert!(manager.award(id.clone()));
        manager.deploy(id.clone(), group(1)).await.unwrap();
        assert_eq!(manager.awaiting_manifest(), 0);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(client.lease_count(), 1);
        wait_for_state(&manager, &id, MonitorState::Deployed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_timeout_drops_lease() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let id = lease(1);

        manager.award(id.clone());
        assert_eq!(manager.awaiting_manifest(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(manager.awaiting_manifest(), 0);
        assert!(manager.monitor(&id).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_in_time_is_deployed() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let id = lease(1);

        manager.award(id.clone());
        tokio::time::sleep(Duration::from_secs(30)).await;
        manager.submit_manifest(id.clone(), group(1)).await.unwrap();
        assert_eq!(manager.awaiting_manifest(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.lease_count(), 1);
        wait_for_state(&manager, &id, MonitorState::Deployed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_from_cluster_deployments() {
        let client = Arc::new(MemoryClusterClient::default());
        client.deploy(&lease(1), &group(1)).await.unwrap();
        client.deploy(&lease(2), &group(2)).await.unwrap();

        let manager = manager(client.clone(), EventBus::default());
        manager.deploy(lease(2), group(2)).await.unwrap();

        assert_eq!(manager.restore().await.unwrap(), 1);
        assert_eq!(manager.monitored_leases(), 2);
        assert_eq!(manager.restore().await.unwrap(), 0);
        wait_for_state(&manager, &lease(1), MonitorState::Deployed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_all() {
        let client = Arc::new(MemoryClusterClient::default());
        let manager = manager(client.clone(), EventBus::default());
        let mut handles = Vec::new();
        for dseq in 1..=3 {
            manager.deploy(lease(dseq), group(1)).await.unwrap();
            handles.push(manager.monitor(&lease(dseq)).unwrap());
        }
        manager.award(lease(9));

        manager.shutdown_all().await;
        assert_eq!(manager.monitored_leases(), 0);
        assert_eq!(manager.awaiting_manifest(), 0);
        assert!(handles.iter().all(|h| h.state() == MonitorState::Closed));

        // Cluster state is left alone for the next start to restore
        assert_eq!(client.lease_count(), 3);
    }
}
