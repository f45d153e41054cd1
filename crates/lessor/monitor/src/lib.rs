//! Lessor Monitor - lease deployment reconciliation
//!
//! Every deployed lease gets one [`DeploymentMonitor`] task. The monitor polls
//! the cluster backend, derives the lease's deployment status from what it
//! observes, and publishes a `ClusterDeployment` event whenever that status
//! changes. It never acts on the cluster itself.
//!
//! The [`LeaseManager`] owns the per-lease monitors and the awarded leases
//! still waiting for their manifest.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod manager;
pub mod monitor;

pub use config::{MonitorConfig, RetryConfig};
pub use error::{MonitorError, MonitorResult};
pub use manager::LeaseManager;
pub use monitor::{derive_status, DerivedStatus, DeploymentMonitor, MonitorHandle, MonitorState};
