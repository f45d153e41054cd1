//! Bid engine

use crate::capacity::{check_capacity, effective_demand, CommitLevels};
use crate::config::BidEngineConfig;
use crate::error::{BidError, BidResult};
use crate::strategy::{create_strategy, BidPricingStrategy};
use lessor_cluster::ClusterClient;
use lessor_types::{BidEngineStatus, DecCoin, GroupSpec};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Default)]
struct Counters {
    considered: AtomicU64,
    priced: AtomicU64,
    declined: AtomicU64,
}

pub struct BidEngine {
    config: BidEngineConfig,
    commit_levels: CommitLevels,
    strategy: Arc<dyn BidPricingStrategy>,
    client: Arc<dyn ClusterClient>,
    counters: Counters,
}

impl BidEngine {
    /// Build an engine using the strategy named in `config`
    pub fn new(config: BidEngineConfig, client: Arc<dyn ClusterClient>) -> BidResult<Self> {
        let strategy = create_strategy(&config.pricing)
            .map_err(|e| BidError::InvalidConfig(e.to_string()))?;
        Self::with_strategy(config, strategy, client)
    }

    pub fn with_strategy(
        config: BidEngineConfig,
        strategy: Arc<dyn BidPricingStrategy>,
        client: Arc<dyn ClusterClient>,
    ) -> BidResult<Self> {
        let commit_levels = CommitLevels {
            cpu: config.cpu_commit_level,
            memory: config.memory_commit_level,
            storage: config.storage_commit_level,
        };
        commit_levels.validate()?;

        info!(strategy = strategy.name(), deposit = %config.deposit, "Bid engine ready");
        Ok(Self {
            config,
            commit_levels,
            strategy,
            client,
            counters: Counters::default(),
        })
    }

    /// Price an order, or explain why the provider declines it
    #[instrument(skip(self, spec), fields(group = %spec.name))]
    pub async fn calculate_price(&self, spec: &GroupSpec) -> BidResult<DecCoin> {
        self.counters.considered.fetch_add(1, Ordering::Relaxed);

        let result = self.price(spec).await;
        match &result {
            Ok(price) => {
                self.counters.priced.fetch_add(1, Ordering::Relaxed);
                info!(price = %price, "Bid priced");
            }
            Err(e) => {
                self.counters.declined.fetch_add(1, Ordering::Relaxed);
                info!(reason = e.code(), error = %e, "Bid declined");
            }
        }
        result
    }

    async fn price(&self, spec: &GroupSpec) -> BidResult<DecCoin> {
        self.check_hostnames(spec)?;
        validate_quantities(spec)?;

        let demand = effective_demand(spec, &self.commit_levels)
            .map_err(|_| BidError::QuantityInvalid("resource quantity overflow".into()))?;
        let inventory = self.client.inventory().await?;
        check_capacity(&demand, &inventory)?;
        debug!(cpu_millis = demand.cpu_millis, memory_bytes = demand.memory_bytes, "Order fits");

        let price = tokio::time::timeout(self.config.bid_timeout, self.strategy.calculate_price(spec))
            .await
            .map_err(|_| BidError::Timeout(self.config.bid_timeout))??;

        self.check_price(spec, &price)?;
        Ok(price)
    }

    fn check_hostnames(&self, spec: &GroupSpec) -> BidResult<()> {
        for hostname in &spec.hostnames {
            if self
                .config
                .blocked_hostnames
                .iter()
                .any(|blocked| hostname_matches(blocked, hostname))
            {
                return Err(BidError::HostnameBlocked(hostname.clone()));
            }
        }

        if self.config.deployment_ingress_static_hosts {
            if let Some(hostname) = spec.hostnames.first() {
                return Err(BidError::StaticHostsOnly(hostname.clone()));
            }
        }
        Ok(())
    }

    fn check_price(&self, spec: &GroupSpec, price: &DecCoin) -> BidResult<()> {
        if !price.is_valid_price() {
            return Err(BidError::InvalidPrice(price.amount));
        }

        let deposit = &self.config.deposit;
        if price.denom != deposit.denom {
            return Err(BidError::DenomMismatch {
                expected: deposit.denom.clone(),
                actual: price.denom.clone(),
            });
        }
        if deposit.amount as f64 > price.amount {
            return Err(BidError::BelowMinimumDeposit(format!(
                "price {price} is below deposit {deposit}"
            )));
        }

        if let Some(max) = &spec.max_price {
            if max.denom != price.denom {
                return Err(BidError::DenomMismatch {
                    expected: max.denom.clone(),
                    actual: price.denom.clone(),
                });
            }
            if price.amount > max.amount {
                return Err(BidError::PriceAboveMaximum {
                    price: price.amount,
                    max: max.amount,
                });
            }
        }
        Ok(())
    }

    pub fn status(&self) -> BidEngineStatus {
        BidEngineStatus {
            orders_considered: self.counters.considered.load(Ordering::Relaxed),
            bids_priced: self.counters.priced.load(Ordering::Relaxed),
            bids_declined: self.counters.declined.load(Ordering::Relaxed),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

/// Exact match, or suffix match for entries starting with '.'
fn hostname_matches(blocked: &str, hostname: &str) -> bool {
    let hostname = hostname.to_ascii_lowercase();
    let blocked = blocked.to_ascii_lowercase();
    if blocked.starts_with('.') {
        hostname.ends_with(&blocked)
    } else {
        hostname == blocked
    }
}

fn validate_quantities(spec: &GroupSpec) -> BidResult<()> {
    if spec.resources.is_empty() {
        return Err(BidError::QuantityInvalid("no resources requested".into()));
    }
    for group in &spec.resources {
        if group.count == 0 {
            return Err(BidError::QuantityInvalid("zero replica count".into()));
        }
        if group.units.cpu_millis == 0 {
            return Err(BidError::QuantityInvalid("zero cpu requested".into()));
        }
        if group.units.memory_bytes == 0 {
            return Err(BidError::QuantityInvalid("zero memory requested".into()));
        }
        group
            .units
            .checked_mul(group.count)
            .map_err(|_| BidError::QuantityInvalid("resource quantity overflow".into()))?;
    }
    Ok(())
}
