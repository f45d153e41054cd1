//! Lessor Bid Engine - prices bids for open orders
//!
//! The [`BidEngine`] screens an order's [`GroupSpec`](lessor_types::GroupSpec)
//! against hostname policy, validates its quantities, checks it against
//! cluster capacity scaled by the configured commit levels, and only then
//! asks the active [`BidPricingStrategy`] for a price. The returned price is
//! checked against the bid deposit and the tenant's maximum.

#![deny(unsafe_code)]

pub mod capacity;
pub mod config;
pub mod engine;
pub mod error;
pub mod strategy;

pub use capacity::{effective_demand, effective_units, CommitLevels};
pub use config::{BidEngineConfig, PricingStrategyConfig, ScalePricing};
pub use engine::BidEngine;
pub use error::{BidError, BidResult, StrategyError};
pub use strategy::{create_strategy, BidPricingStrategy};
