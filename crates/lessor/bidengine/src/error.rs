//! Bid engine error types
//!
//! Every error here declines one order; none of them is fatal to the engine.

use lessor_cluster::ClusterError;
use std::time::Duration;
use thiserror::Error;

/// Errors shared by all pricing strategies
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("bid quantity invalid: {0}")]
    QuantityInvalid(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("price below minimum deposit: {0}")]
    BelowMinimumDeposit(String),

    #[error("strategy failed: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum BidError {
    #[error("hostname blocked: {0}")]
    HostnameBlocked(String),

    #[error("custom hostname {0} not allowed, static ingress hosts only")]
    StaticHostsOnly(String),

    #[error("bid quantity invalid: {0}")]
    QuantityInvalid(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("pricing timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("price below minimum deposit: {0}")]
    BelowMinimumDeposit(String),

    #[error("denomination mismatch: expected {expected}, got {actual}")]
    DenomMismatch { expected: String, actual: String },

    #[error("price {price} above tenant maximum {max}")]
    PriceAboveMaximum { price: f64, max: f64 },

    #[error("inventory unavailable: {0}")]
    Inventory(#[from] ClusterError),

    #[error("strategy failed: {0}")]
    Strategy(String),

    #[error("invalid bid engine configuration: {0}")]
    InvalidConfig(String),
}

impl BidError {
    /// Stable machine-readable decline reason
    pub fn code(&self) -> &'static str {
        match self {
            BidError::HostnameBlocked(_) => "HOSTNAME_BLOCKED",
            BidError::StaticHostsOnly(_) => "STATIC_HOSTS_ONLY",
            BidError::QuantityInvalid(_) => "QUANTITY_INVALID",
            BidError::InsufficientCapacity(_) => "INSUFFICIENT_CAPACITY",
            BidError::Timeout(_) => "TIMEOUT",
            BidError::InvalidPrice(_) => "INVALID_PRICE",
            BidError::BelowMinimumDeposit(_) => "BELOW_MINIMUM_DEPOSIT",
            BidError::DenomMismatch { .. } => "DENOM_MISMATCH",
            BidError::PriceAboveMaximum { .. } => "PRICE_ABOVE_MAXIMUM",
            BidError::Inventory(_) => "INVENTORY_UNAVAILABLE",
            BidError::Strategy(_) => "STRATEGY_FAILED",
            BidError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

impl From<StrategyError> for BidError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::QuantityInvalid(msg) => BidError::QuantityInvalid(msg),
            StrategyError::InsufficientCapacity(msg) => BidError::InsufficientCapacity(msg),
            StrategyError::BelowMinimumDeposit(msg) => BidError::BelowMinimumDeposit(msg),
            StrategyError::Internal(msg) => BidError::Strategy(msg),
        }
    }
}

pub type BidResult<T> = Result<T, BidError>;
