//! Lessor Types - Core types for the provider marketplace daemon
//!
//! Lessor is the daemon a resource operator runs to take part in a
//! decentralized compute marketplace. It prices bids for open orders,
//! deploys awarded leases onto a cluster runtime, and reconciles observed
//! cluster state against the desired manifest.
//!
//! ## Key Concepts
//!
//! - **LeaseId**: Names one awarded lease (owner, deployment, group, provider)
//! - **ManifestGroup**: Desired state for a lease (services, replicas, exposes)
//! - **LeaseStatus**: Observed state reported by the cluster backend
//! - **GroupSpec**: Resource request of an open order, input to bid pricing
//! - **Events**: Immutable lifecycle facts published on the event bus
//! - **Status**: Aggregate read model served to external queries

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cluster;
pub mod coin;
pub mod events;
pub mod ids;
pub mod manifest;
pub mod order;
pub mod resources;
pub mod serde_helpers;
pub mod status;

// Re-export main types
pub use cluster::{
    ForwardedPortStatus, Inventory, LeaseEvent, LeaseStatus, NodeInventory, ServiceStatus,
};
pub use coin::{Coin, DecCoin};
pub use events::{
    ClusterDeployment, ClusterDeploymentStatus, EventEnvelope, EventSeverity, EventSource,
    ProviderEvent,
};
pub use ids::{LeaseId, ParseLeaseIdError};
pub use manifest::{ManifestGroup, Protocol, Service, ServiceExpose};
pub use order::{GroupSpec, ResourceGroup};
pub use resources::{ResourceOverflow, ResourceUnits};
pub use status::{BidEngineStatus, ClusterStatus, ManifestStatus, MonitorCounts, Status};
