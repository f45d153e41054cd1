//! Monitor timing configuration

use lessor_types::serde_helpers::duration_millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for failed status polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after a failed poll; the lease is marked failed when the
    /// last of them fails too
    pub max_retries: u32,

    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,

    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,

    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following the `failures`-th consecutive failure
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);

        Duration::try_from_secs_f64(secs)
            .map(|d| d.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Base delay between successful polls
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Upper bound of the random delay added to each interval
    #[serde(with = "duration_millis")]
    pub poll_jitter: Duration,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_jitter: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }
}
