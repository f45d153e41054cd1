//! Lessor Cluster - capability contract for cluster backends
//!
//! The daemon never talks to a container orchestrator directly. Everything it
//! needs (deploying a manifest, observing a lease, streaming events and logs,
//! running commands in a replica, reading capacity) goes through the
//! [`ClusterClient`] trait.
//!
//! [`MemoryClusterClient`] is the reference backend used by tests and by the
//! daemon when no real backend adapter is wired in.

#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod memory;

pub use client::{
    ClusterClient, DeploymentRecord, EventWatcher, ExecRequest, ExecResult, LogLine, LogStream,
    StreamReceiver, TerminalSize,
};
pub use error::{ClusterError, ClusterResult, ExecError};
pub use memory::{MemoryClusterClient, MemoryClusterConfig};
