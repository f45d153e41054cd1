//! Token amounts used for deposits, balances and prices

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer token amount (deposits, escrow balances)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Fractional token amount (bid prices per block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: f64,
}

impl DecCoin {
    pub fn new(denom: impl Into<String>, amount: f64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// A usable price is finite and not negative
    pub fn is_valid_price(&self) -> bool {
        self.amount.is_finite() && self.amount >= 0.0
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}
