//! Lessor daemon library
//!
//! This module provides the components wired together by `lessord`:
//! - Configuration loading
//! - Inventory polling and status aggregation
//! - REST API handlers
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod inventory;
pub mod server;
pub mod status;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use inventory::{InventoryHandle, InventoryPoller};
pub use server::{RunningDaemon, Server};
pub use status::StatusAggregator;
