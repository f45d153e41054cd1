use super::BidPricingStrategy;
use crate::config::ScalePricing;
use crate::error::StrategyError;
use async_trait::async_trait;
use lessor_types::{DecCoin, GroupSpec, ResourceUnits};

const MIB: f64 = 1024.0 * 1024.0;

/// Prices each requested unit at a configured scale
pub struct ScaleStrategy {
    scale: ScalePricing,
}

impl ScaleStrategy {
    pub fn new(scale: ScalePricing) -> Result<Self, StrategyError> {
        for (name, value) in [
            ("cpu_scale", scale.cpu_scale),
            ("memory_scale", scale.memory_scale),
            ("storage_scale", scale.storage_scale),
            ("gpu_scale", scale.gpu_scale),
            ("endpoint_scale", scale.endpoint_scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StrategyError::Internal(format!(
                    "{name} must be a finite non-negative number"
                )));
            }
        }
        Ok(Self { scale })
    }

    fn unit_price(&self, units: &ResourceUnits) -> f64 {
        units.cpu_millis as f64 * self.scale.cpu_scale
            + units.memory_bytes as f64 / MIB * self.scale.memory_scale
            + units.storage_bytes as f64 / MIB * self.scale.storage_scale
            + f64::from(units.gpu) * self.scale.gpu_scale
            + f64::from(units.endpoints) * self.scale.endpoint_scale
    }

    /// Cost of the whole order in the configured denomination
    pub(crate) fn base_cost(&self, spec: &GroupSpec) -> Result<f64, StrategyError> {
        if spec.resources.is_empty() {
            return Err(StrategyError::QuantityInvalid("no resources requested".into()));
        }

        let mut total = 0.0;
        for group in &spec.resources {
            if group.count == 0 {
                return Err(StrategyError::QuantityInvalid("zero replica count".into()));
            }
            total += self.unit_price(&group.units) * f64::from(group.count);
        }

        if !total.is_finite() {
            return Err(StrategyError::QuantityInvalid("price overflow".into()));
        }
        Ok(total)
    }

    pub(crate) fn denom(&self) -> &str {
        &self.scale.denom
    }
}

#[async_trait]
impl BidPricingStrategy for ScaleStrategy {
    async fn calculate_price(&self, spec: &GroupSpec) -> Result<DecCoin, StrategyError> {
        Ok(DecCoin::new(self.scale.denom.clone(), self.base_cost(spec)?))
    }

    fn name(&self) -> &'static str {
        "scale"
    }
}
