//! Balance checker error types

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("Balance query failed: {0}")]
    Query(String),

    #[error("Balance query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Withdrawal failed: {0}")]
    Withdrawal(String),
}

pub type BalanceResult<T> = Result<T, BalanceError>;
