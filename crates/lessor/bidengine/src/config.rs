//! Bid engine configuration

use lessor_types::Coin;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-unit prices used by scale-based strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalePricing {
    pub denom: String,

    /// Price per millicore
    pub cpu_scale: f64,

    /// Price per MiB of memory
    pub memory_scale: f64,

    /// Price per MiB of storage
    pub storage_scale: f64,

    /// Price per GPU
    pub gpu_scale: f64,

    /// Price per exposed endpoint
    pub endpoint_scale: f64,
}

impl Default for ScalePricing {
    fn default() -> Self {
        Self {
            denom: "uakt".to_string(),
            cpu_scale: 0.001,
            memory_scale: 0.0001,
            storage_scale: 0.00001,
            gpu_scale: 1.0,
            endpoint_scale: 0.01,
        }
    }
}

/// The active pricing strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PricingStrategyConfig {
    /// Sum of per-unit prices
    Scale(ScalePricing),

    /// Scale-based cost plus a fixed relative margin
    FixedMargin {
        #[serde(default)]
        scale: ScalePricing,
        margin: f64,
    },

    /// Uniformly random within bounds, capped by the tenant's maximum
    RandomRange { denom: String, min: f64, max: f64 },
}

impl Default for PricingStrategyConfig {
    fn default() -> Self {
        PricingStrategyConfig::Scale(ScalePricing::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BidEngineConfig {
    pub pricing: PricingStrategyConfig,

    /// Deposit posted with every bid; prices below it are declined
    pub deposit: Coin,

    pub cpu_commit_level: f64,
    pub memory_commit_level: f64,
    pub storage_commit_level: f64,

    /// Exact hostnames, or domain suffixes when starting with '.'
    pub blocked_hostnames: Vec<String>,

    /// Refuse orders that request custom hostnames
    pub deployment_ingress_static_hosts: bool,

    pub bid_timeout: Duration,
}

impl Default for BidEngineConfig {
    fn default() -> Self {
        Self {
            pricing: PricingStrategyConfig::default(),
            deposit: Coin::new("uakt", 1),
            cpu_commit_level: 0.0,
            memory_commit_level: 0.0,
            storage_commit_level: 0.0,
            blocked_hostnames: Vec::new(),
            deployment_ingress_static_hosts: false,
            bid_timeout: Duration::from_secs(5),
        }
    }
}
