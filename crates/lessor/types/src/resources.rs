//! Resource quantities requested by services and offered by nodes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arithmetic on resource quantities overflowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resource quantity overflow")]
pub struct ResourceOverflow;

/// A bundle of resource units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceUnits {
    /// CPU in thousandths of a core
    #[serde(default)]
    pub cpu_millis: u64,

    /// Memory in bytes
    #[serde(default)]
    pub memory_bytes: u64,

    /// Ephemeral + persistent storage in bytes
    #[serde(default)]
    pub storage_bytes: u64,

    /// GPU units
    #[serde(default)]
    pub gpu: u32,

    /// Exposed endpoints
    #[serde(default)]
    pub endpoints: u32,
}

impl ResourceUnits {
    pub fn new(cpu_millis: u64, memory_bytes: u64, storage_bytes: u64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
            storage_bytes,
            gpu: 0,
            endpoints: 0,
        }
    }

    pub fn with_gpu(mut self, gpu: u32) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn with_endpoints(mut self, endpoints: u32) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Multiply every quantity by `count`
    pub fn checked_mul(&self, count: u32) -> Result<Self, ResourceOverflow> {
        let n = u64::from(count);
        Ok(Self {
            cpu_millis: self.cpu_millis.checked_mul(n).ok_or(ResourceOverflow)?,
            memory_bytes: self.memory_bytes.checked_mul(n).ok_or(ResourceOverflow)?,
            storage_bytes: self.storage_bytes.checked_mul(n).ok_or(ResourceOverflow)?,
            gpu: self.gpu.checked_mul(count).ok_or(ResourceOverflow)?,
            endpoints: self.endpoints.checked_mul(count).ok_or(ResourceOverflow)?,
        })
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, ResourceOverflow> {
        Ok(Self {
            cpu_millis: self
                .cpu_millis
                .checked_add(other.cpu_millis)
                .ok_or(ResourceOverflow)?,
            memory_bytes: self
                .memory_bytes
                .checked_add(other.memory_bytes)
                .ok_or(ResourceOverflow)?,
            storage_bytes: self
                .storage_bytes
                .checked_add(other.storage_bytes)
                .ok_or(ResourceOverflow)?,
            gpu: self.gpu.checked_add(other.gpu).ok_or(ResourceOverflow)?,
            endpoints: self
                .endpoints
                .checked_add(other.endpoints)
                .ok_or(ResourceOverflow)?,
        })
    }

    pub fn saturating_add(&self, other: &Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.saturating_add(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
            storage_bytes: self.storage_bytes.saturating_add(other.storage_bytes),
            gpu: self.gpu.saturating_add(other.gpu),
            endpoints: self.endpoints.saturating_add(other.endpoints),
        }
    }

    pub fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_sub(other.memory_bytes),
            storage_bytes: self.storage_bytes.saturating_sub(other.storage_bytes),
            gpu: self.gpu.saturating_sub(other.gpu),
            endpoints: self.endpoints.saturating_sub(other.endpoints),
        }
    }

    /// True if every quantity is at most the corresponding one in `capacity`
    pub fn fits_within(&self, capacity: &Self) -> bool {
        self.cpu_millis <= capacity.cpu_millis
            && self.memory_bytes <= capacity.memory_bytes
            && self.storage_bytes <= capacity.storage_bytes
            && self.gpu <= capacity.gpu
            && self.endpoints <= capacity.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_mul_overflow() {
        let units = ResourceUnits::new(u64::MAX, 1, 1);
        assert_eq!(units.checked_mul(2), Err(ResourceOverflow));
        assert_eq!(
            ResourceUnits::new(100, 200, 300).checked_mul(3).unwrap(),
            ResourceUnits::new(300, 600, 900)
        );
    }

    #[test]
    fn test_fits_within() {
        let capacity = ResourceUnits::new(1000, 1024, 4096).with_gpu(1);
        assert!(ResourceUnits::new(1000, 1024, 0).fits_within(&capacity));
        assert!(!ResourceUnits::new(1001, 1024, 0).fits_within(&capacity));
        assert!(!ResourceUnits::new(1, 1, 1).with_gpu(2).fits_within(&capacity));
    }

    #[test]
    fn test_saturating_sub() {
        let a = ResourceUnits::new(100, 100, 100);
        let b = ResourceUnits::new(150, 50, 100);
        assert_eq!(a.saturating_sub(&b), ResourceUnits::new(0, 50, 0));
    }
}
