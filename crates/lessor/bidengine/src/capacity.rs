//! Commit-level scaling of resource demand
//!
//! A commit level `l >= 0` lets the provider accept more demand than it has
//! physical capacity for: a request for `v` units is counted as
//! `round(v / (1 + l))` units, never less than one unit for a non-zero
//! request.

use crate::error::{BidError, BidResult};
use lessor_types::{GroupSpec, Inventory, ResourceOverflow, ResourceUnits};

/// Overcommit multipliers per resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommitLevels {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
}

impl CommitLevels {
    pub fn validate(&self) -> BidResult<()> {
        for (name, level) in [
            ("cpu", self.cpu),
            ("memory", self.memory),
            ("storage", self.storage),
        ] {
            if !level.is_finite() || level < 0.0 {
                return Err(BidError::InvalidConfig(format!(
                    "{name} commit level must be a finite non-negative number, got {level}"
                )));
            }
        }
        Ok(())
    }
}

/// Units counted against capacity for a request of `value` units
pub fn effective_units(value: u64, commit_level: f64) -> u64 {
    if value == 0 {
        return 0;
    }
    let scaled = (value as f64 / (1.0 + commit_level)).round();
    (scaled as u64).clamp(1, value)
}

fn scale(units: &ResourceUnits, levels: &CommitLevels) -> ResourceUnits {
    ResourceUnits {
        cpu_millis: effective_units(units.cpu_millis, levels.cpu),
        memory_bytes: effective_units(units.memory_bytes, levels.memory),
        storage_bytes: effective_units(units.storage_bytes, levels.storage),
        gpu: units.gpu,
        endpoints: units.endpoints,
    }
}

/// Total demand of an order after commit-level scaling
pub fn effective_demand(
    spec: &GroupSpec,
    levels: &CommitLevels,
) -> Result<ResourceUnits, ResourceOverflow> {
    spec.resources
        .iter()
        .try_fold(ResourceUnits::default(), |acc, group| {
            acc.checked_add(&scale(&group.units, levels).checked_mul(group.count)?)
        })
}

/// Reject demand that does not fit in the inventory's total availability
pub fn check_capacity(demand: &ResourceUnits, inventory: &Inventory) -> BidResult<()> {
    let available = inventory.total_available();
    if demand.fits_within(&available) {
        return Ok(());
    }

    let mut short = Vec::new();
    if demand.cpu_millis > available.cpu_millis {
        short.push(format!("cpu {} > {}", demand.cpu_millis, available.cpu_millis));
    }
    if demand.memory_bytes > available.memory_bytes {
        short.push(format!("memory {} > {}", demand.memory_bytes, available.memory_bytes));
    }
    if demand.storage_bytes > available.storage_bytes {
        short.push(format!("storage {} > {}", demand.storage_bytes, available.storage_bytes));
    }
    if demand.gpu > available.gpu {
        short.push(format!("gpu {} > {}", demand.gpu, available.gpu));
    }
    if demand.endpoints > available.endpoints {
        short.push(format!("endpoints {} > {}", demand.endpoints, available.endpoints));
    }
    Err(BidError::InsufficientCapacity(short.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessor_types::NodeInventory;
    use proptest::prelude::*;

    #[test]
    fn test_effective_units_examples() {
        assert_eq!(effective_units(0, 1.0), 0);
        assert_eq!(effective_units(1000, 0.0), 1000);
        assert_eq!(effective_units(1000, 1.0), 500);
        assert_eq!(effective_units(1, 10.0), 1);
        assert_eq!(effective_units(3, 1.0), 2);
    }

    #[test]
    fn test_commit_levels_validate() {
        assert!(CommitLevels::default().validate().is_ok());
        let bad = CommitLevels {
            memory: -0.5,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(BidError::InvalidConfig(_))));
        let nan = CommitLevels {
            cpu: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_check_capacity_reports_shortfall() {
        let inventory = Inventory {
            nodes: vec![NodeInventory::new("a", ResourceUnits::new(1000, 1000, 1000))],
        };
        assert!(check_capacity(&ResourceUnits::new(1000, 1000, 0), &inventory).is_ok());

        let err = check_capacity(&ResourceUnits::new(1001, 10, 0), &inventory).unwrap_err();
        match err {
            BidError::InsufficientCapacity(msg) => assert!(msg.contains("cpu")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_overcommit_admits_more_demand() {
        let inventory = Inventory {
            nodes: vec![NodeInventory::new("a", ResourceUnits::new(1000, 1 << 30, 0))],
        };
        let spec = GroupSpec::new("g").with_resources(ResourceUnits::new(500, 1 << 20, 0), 4);

        let strict = effective_demand(&spec, &CommitLevels::default()).unwrap();
        assert!(check_capacity(&strict, &inventory).is_err());

        let relaxed = CommitLevels {
            cpu: 1.0,
            ..Default::default()
        };
        let demand = effective_demand(&spec, &relaxed).unwrap();
        assert_eq!(demand.cpu_millis, 1000);
        assert!(check_capacity(&demand, &inventory).is_ok());
    }

    proptest! {
        #[test]
        fn prop_effective_bounded(value in 1u64..u64::MAX, level in 0.0f64..100.0) {
            let effective = effective_units(value, level);
            prop_assert!(effective >= 1);
            prop_assert!(effective <= value);
        }

        #[test]
        fn prop_effective_monotone_in_level(
            value in 0u64..1_000_000_000,
            a in 0.0f64..50.0,
            b in 0.0f64..50.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(effective_units(value, high) <= effective_units(value, low));
        }

        #[test]
        fn prop_zero_level_is_identity(value in 0u64..(1u64 << 52)) {
            prop_assert_eq!(effective_units(value, 0.0), value);
        }
    }
}
