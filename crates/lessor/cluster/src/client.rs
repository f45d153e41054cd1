//! The cluster client trait and its streaming types

use crate::error::ClusterResult;
use async_trait::async_trait;
use futures::Stream;
use lessor_types::{Inventory, LeaseEvent, LeaseId, LeaseStatus, ManifestGroup, ServiceStatus};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// A lease the backend currently runs, with the manifest it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub lease_id: LeaseId,
    pub group: ManifestGroup,
}

/// Lazy receiver for items produced by the backend
///
/// Finite when the backend was asked not to follow; otherwise it ends when
/// the lease is torn down, or when the receiver is stopped or dropped.
#[derive(Debug)]
pub struct StreamReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> StreamReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Next item, or `None` once the stream has ended
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop the producer; buffered items can still be drained
    pub fn stop(&mut self) {
        self.rx.close();
    }
}

impl<T> Stream for StreamReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Stream of backend events for a lease
pub type EventWatcher = StreamReceiver<LeaseEvent>;

/// Stream of log lines for a lease
pub type LogStream = StreamReceiver<LogLine>;

/// One line of service output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub service: String,
    pub pod: u32,
    pub line: String,
}

/// Terminal dimensions sent while an interactive exec is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

/// A command to run inside one replica of a lease's service
pub struct ExecRequest {
    pub lease_id: LeaseId,
    pub service: String,

    /// Replica to run in; required when the service has more than one
    pub pod_index: Option<u32>,
    pub cmd: Vec<String>,

    pub stdin: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub stdout: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    pub stderr: Option<Box<dyn AsyncWrite + Send + Unpin>>,

    pub tty: bool,
    pub resize: Option<mpsc::Receiver<TerminalSize>>,
}

impl ExecRequest {
    pub fn new(lease_id: LeaseId, service: impl Into<String>, cmd: Vec<String>) -> Self {
        Self {
            lease_id,
            service: service.into(),
            pod_index: None,
            cmd,
            stdin: None,
            stdout: None,
            stderr: None,
            tty: false,
            resize: None,
        }
    }

    pub fn with_pod_index(mut self, index: u32) -> Self {
        self.pod_index = Some(index);
        self
    }

    pub fn with_stdin(mut self, stdin: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(stdin));
        self
    }

    pub fn with_stdout(mut self, stdout: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(stdout));
        self
    }

    pub fn with_stderr(mut self, stderr: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(stderr));
        self
    }
}

impl std::fmt::Debug for ExecRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecRequest")
            .field("lease_id", &self.lease_id)
            .field("service", &self.service)
            .field("pod_index", &self.pod_index)
            .field("cmd", &self.cmd)
            .field("tty", &self.tty)
            .finish_non_exhaustive()
    }
}

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
}

/// Capabilities the daemon needs from a cluster backend
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create or replace the workload for a lease
    async fn deploy(&self, lease_id: &LeaseId, group: &ManifestGroup) -> ClusterResult<()>;

    /// Remove every resource belonging to a lease; a no-op for unknown leases
    async fn teardown_lease(&self, lease_id: &LeaseId) -> ClusterResult<()>;

    /// Observed state of a lease, `None` if the backend does not know it
    async fn lease_status(&self, lease_id: &LeaseId) -> ClusterResult<Option<LeaseStatus>>;

    async fn lease_events(
        &self,
        lease_id: &LeaseId,
        service: Option<&str>,
        follow: bool,
    ) -> ClusterResult<EventWatcher>;

    async fn lease_logs(
        &self,
        lease_id: &LeaseId,
        service: Option<&str>,
        follow: bool,
        tail_lines: Option<usize>,
    ) -> ClusterResult<LogStream>;

    async fn service_status(&self, lease_id: &LeaseId, service: &str)
        -> ClusterResult<ServiceStatus>;

    /// Leases the backend is currently running
    async fn deployments(&self) -> ClusterResult<Vec<DeploymentRecord>>;

    /// Per-node allocatable and available capacity
    async fn inventory(&self) -> ClusterResult<Inventory>;

    async fn exec(&self, request: ExecRequest) -> ClusterResult<ExecResult>;
}
