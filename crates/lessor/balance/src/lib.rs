//! Lessor Balance - escrow balance checker
//!
//! Periodically reads the provider's balance through an injected
//! [`BalanceReader`], warns when it drops below a threshold, and triggers
//! withdrawals of accrued lease payments on a fixed period through an
//! injected [`WithdrawalTrigger`]. Transaction construction lives with the
//! chain client, outside this crate.

#![deny(unsafe_code)]

pub mod checker;
pub mod error;

pub use checker::{
    BalanceChecker, BalanceCheckerConfig, BalanceCheckerHandle, BalanceReader, BalanceSnapshot,
    WithdrawalTrigger,
};
pub use error::{BalanceError, BalanceResult};
