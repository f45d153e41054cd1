use super::BidPricingStrategy;
use crate::error::StrategyError;
use async_trait::async_trait;
use lessor_types::{DecCoin, GroupSpec};
use rand::Rng;

/// Uniformly random price within bounds
///
/// Randomizing makes it harder for providers to settle on a common price.
/// The upper bound is lowered to the tenant's maximum when one is given in
/// the same denomination.
pub struct RandomRangeStrategy {
    denom: String,
    min: f64,
    max: f64,
}

impl RandomRangeStrategy {
    pub fn new(denom: impl Into<String>, min: f64, max: f64) -> Result<Self, StrategyError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(StrategyError::Internal(format!(
                "invalid price range [{min}, {max}]"
            )));
        }
        Ok(Self {
            denom: denom.into(),
            min,
            max,
        })
    }

    fn upper_bound(&self, spec: &GroupSpec) -> f64 {
        match &spec.max_price {
            Some(cap) if cap.denom == self.denom && cap.is_valid_price() => {
                self.max.min(cap.amount).max(self.min)
            }
            _ => self.max,
        }
    }
}

#[async_trait]
impl BidPricingStrategy for RandomRangeStrategy {
    async fn calculate_price(&self, spec: &GroupSpec) -> Result<DecCoin, StrategyError> {
        if spec.resources.is_empty() {
            return Err(StrategyError::QuantityInvalid("no resources requested".into()));
        }

        let upper = self.upper_bound(spec);
        let amount = rand::thread_rng().gen_range(self.min..=upper);
        Ok(DecCoin::new(self.denom.clone(), amount))
    }

    fn name(&self) -> &'static str {
        "random_range"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessor_types::ResourceUnits;

    fn spec() -> GroupSpec {
        GroupSpec::new("g").with_resources(ResourceUnits::new(100, 100, 0), 1)
    }

    #[tokio::test]
    async fn test_price_within_bounds() {
        let strategy = RandomRangeStrategy::new("uakt", 10.0, 20.0).unwrap();
        for _ in 0..100 {
            let price = strategy.calculate_price(&spec()).await.unwrap();
            assert!((10.0..=20.0).contains(&price.amount));
        }
    }

    #[tokio::test]
    async fn test_capped_by_tenant_max() {
        let strategy = RandomRangeStrategy::new("uakt", 10.0, 20.0).unwrap();
        let capped = spec().with_max_price(DecCoin::new("uakt", 12.0));
        for _ in 0..100 {
            let price = strategy.calculate_price(&capped).await.unwrap();
            assert!((10.0..=12.0).contains(&price.amount));
        }

        let below = spec().with_max_price(DecCoin::new("uakt", 1.0));
        let price = strategy.calculate_price(&below).await.unwrap();
        assert_eq!(price.amount, 10.0);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(RandomRangeStrategy::new("uakt", 2.0, 1.0).is_err());
    }
}
