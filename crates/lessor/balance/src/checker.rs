//! Balance checker loop

use crate::error::{BalanceError, BalanceResult};
use async_trait::async_trait;
use lessor_events::EventBus;
use lessor_types::{Coin, EventSource, ProviderEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Reads the provider's current escrow balance
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn balance(&self) -> BalanceResult<Coin>;
}

/// Submits a withdrawal of accrued lease payments
#[async_trait]
pub trait WithdrawalTrigger: Send + Sync {
    async fn withdraw(&self) -> BalanceResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheckerConfig {
    pub polling_period: Duration,

    /// Balances strictly below this amount raise a warning
    pub minimum_balance_threshold: u64,

    /// Zero disables withdrawals
    pub withdrawal_period: Duration,
}

impl Default for BalanceCheckerConfig {
    fn default() -> Self {
        Self {
            polling_period: Duration::from_secs(60),
            minimum_balance_threshold: 0,
            withdrawal_period: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Latest view of the balance, published after every tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub balance: Option<Coin>,
    pub checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub below_threshold: bool,
    pub consecutive_failures: u32,
    pub withdrawals: u64,
    pub last_withdrawal_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct BalanceChecker {
    config: BalanceCheckerConfig,
    reader: Arc<dyn BalanceReader>,
    trigger: Option<Arc<dyn WithdrawalTrigger>>,
    bus: EventBus,
}

impl BalanceChecker {
    pub fn new(config: BalanceCheckerConfig, reader: Arc<dyn BalanceReader>, bus: EventBus) -> Self {
        Self {
            config,
            reader,
            trigger: None,
            bus,
        }
    }

    pub fn with_withdrawal_trigger(mut self, trigger: Arc<dyn WithdrawalTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn spawn(self) -> BalanceCheckerHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(BalanceSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            polling_period_secs = self.config.polling_period.as_secs(),
            threshold = self.config.minimum_balance_threshold,
            withdrawal_period_secs = self.config.withdrawal_period.as_secs(),
            "Starting balance checker"
        );
        let task = tokio::spawn(self.run(snapshot_tx, shutdown_rx));

        BalanceCheckerHandle {
            snapshot: snapshot_rx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(
        self,
        snapshot_tx: watch::Sender<BalanceSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut snapshot = BalanceSnapshot::default();
        let mut last_withdrawal = Instant::now();

        let period = self.config.polling_period.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let tick = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                tick = ticker.tick() => tick,
            };

            let checked = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                checked = self.check_balance(&mut snapshot) => checked,
            };
            if let Err(e) = checked {
                snapshot.consecutive_failures += 1;
                warn!(
                    error = %e,
                    failures = snapshot.consecutive_failures,
                    "Balance check failed"
                );
            }

            if self.withdrawal_due(last_withdrawal) {
                match self.withdraw(&snapshot).await {
                    Ok(()) => {
                        // Measured from the tick, not from when the trigger returned
                        last_withdrawal = tick;
                        snapshot.withdrawals += 1;
                        snapshot.last_withdrawal_at = Some(chrono::Utc::now());
                    }
                    Err(e) => warn!(error = %e, "Withdrawal failed, retrying next tick"),
                }
            }

            snapshot_tx.send_replace(snapshot.clone());
        }

        debug!("Balance checker stopped");
    }

    async fn check_balance(&self, snapshot: &mut BalanceSnapshot) -> BalanceResult<()> {
        let timeout = self.config.polling_period;
        let balance = tokio::time::timeout(timeout, self.reader.balance())
            .await
            .map_err(|_| BalanceError::Timeout(timeout))??;

        let threshold = self.config.minimum_balance_threshold;
        let below = balance.amount < threshold;
        if below {
            warn!(balance = %balance, threshold, "Balance below threshold");
            self.bus.emit(
                ProviderEvent::BalanceBelowThreshold {
                    balance: balance.clone(),
                    threshold,
                },
                EventSource::BalanceChecker,
            );
        } else {
            debug!(balance = %balance, "Balance checked");
        }

        snapshot.balance = Some(balance);
        snapshot.below_threshold = below;
        snapshot.checked_at = Some(chrono::Utc::now());
        snapshot.consecutive_failures = 0;
        Ok(())
    }

    fn withdrawal_due(&self, last_withdrawal: Instant) -> bool {
        self.trigger.is_some()
            && !self.config.withdrawal_period.is_zero()
            && last_withdrawal.elapsed() >= self.config.withdrawal_period
    }

    async fn withdraw(&self, snapshot: &BalanceSnapshot) -> BalanceResult<()> {
        let Some(trigger) = &self.trigger else {
            return Ok(());
        };

        trigger.withdraw().await?;
        info!(balance = ?snapshot.balance, "Withdrawal triggered");
        self.bus.emit(
            ProviderEvent::WithdrawalTriggered {
                balance: snapshot.balance.clone(),
            },
            EventSource::BalanceChecker,
        );
        Ok(())
    }
}

pub struct BalanceCheckerHandle {
    snapshot: watch::Receiver<BalanceSnapshot>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BalanceCheckerHandle {
    pub fn snapshot(&self) -> BalanceSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BalanceSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the checker and wait for it; idempotent
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Balance checker task ended abnormally");
            }
        }
    }
}
