//! Pricing strategies
//!
//! Exactly one strategy is active per engine, chosen by
//! [`PricingStrategyConfig`].

mod fixed_margin;
mod random_range;
mod scale;

pub use fixed_margin::FixedMarginStrategy;
pub use random_range::RandomRangeStrategy;
pub use scale::ScaleStrategy;

use crate::config::PricingStrategyConfig;
use crate::error::StrategyError;
use async_trait::async_trait;
use lessor_types::{DecCoin, GroupSpec};
use std::sync::Arc;

/// Computes the price to bid for an order
#[async_trait]
pub trait BidPricingStrategy: Send + Sync {
    async fn calculate_price(&self, spec: &GroupSpec) -> Result<DecCoin, StrategyError>;

    fn name(&self) -> &'static str;
}

/// Build the strategy selected in configuration
pub fn create_strategy(
    config: &PricingStrategyConfig,
) -> Result<Arc<dyn BidPricingStrategy>, StrategyError> {
    let strategy: Arc<dyn BidPricingStrategy> = match config {
        PricingStrategyConfig::Scale(scale) => Arc::new(ScaleStrategy::new(scale.clone())?),
        PricingStrategyConfig::FixedMargin { scale, margin } => {
            Arc::new(FixedMarginStrategy::new(scale.clone(), *margin)?)
        }
        PricingStrategyConfig::RandomRange { denom, min, max } => {
            Arc::new(RandomRangeStrategy::new(denom.clone(), *min, *max)?)
        }
    };
    Ok(strategy)
}
