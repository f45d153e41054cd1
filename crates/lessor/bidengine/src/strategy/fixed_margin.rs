use super::{BidPricingStrategy, ScaleStrategy};
use crate::config::ScalePricing;
use crate::error::StrategyError;
use async_trait::async_trait;
use lessor_types::{DecCoin, GroupSpec};

/// Scale-based cost plus a fixed relative margin
pub struct FixedMarginStrategy {
    base: ScaleStrategy,
    margin: f64,
}

impl FixedMarginStrategy {
    pub fn new(scale: ScalePricing, margin: f64) -> Result<Self, StrategyError> {
        if !margin.is_finite() || margin < 0.0 {
            return Err(StrategyError::Internal(format!(
                "margin must be a finite non-negative number, got {margin}"
            )));
        }
        Ok(Self {
            base: ScaleStrategy::new(scale)?,
            margin,
        })
    }
}

#[async_trait]
impl BidPricingStrategy for FixedMarginStrategy {
    async fn calculate_price(&self, spec: &GroupSpec) -> Result<DecCoin, StrategyError> {
        let cost = self.base.base_cost(spec)?;
        Ok(DecCoin::new(self.base.denom(), cost * (1.0 + self.margin)))
    }

    fn name(&self) -> &'static str {
        "fixed_margin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessor_types::ResourceUnits;

    #[tokio::test]
    async fn test_margin_applied() {
        let scale = ScalePricing {
            cpu_scale: 1.0,
            memory_scale: 0.0,
            storage_scale: 0.0,
            ..Default::default()
        };
        let strategy = FixedMarginStrategy::new(scale, 0.25).unwrap();
        let spec = GroupSpec::new("g").with_resources(ResourceUnits::new(400, 1, 0), 1);

        let price = strategy.calculate_price(&spec).await.unwrap();
        assert_eq!(price.amount, 500.0);
    }

    #[test]
    fn test_negative_margin_rejected() {
        assert!(FixedMarginStrategy::new(ScalePricing::default(), -0.1).is_err());
    }
}
