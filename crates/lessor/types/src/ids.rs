//! Strongly-typed identifiers for marketplace entities
//!
//! A lease is named by the tenant that owns the deployment, the deployment
//! and group sequence numbers assigned on chain, and the provider that won it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for an awarded lease
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeaseId {
    /// Tenant address owning the deployment
    pub owner: String,

    /// Deployment sequence
    pub dseq: u64,

    /// Group sequence within the deployment
    pub gseq: u32,

    /// Provider address that won the lease
    pub provider: String,
}

impl LeaseId {
    pub fn new(owner: impl Into<String>, dseq: u64, gseq: u32, provider: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            dseq,
            gseq,
            provider: provider.into(),
        }
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.owner, self.dseq, self.gseq, self.provider
        )
    }
}

/// Error parsing a lease identifier from its path form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLeaseIdError {
    #[error("expected owner/dseq/gseq/provider, got {0} segments")]
    WrongArity(usize),

    #[error("empty {0} segment")]
    Empty(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidSequence { field: &'static str, value: String },
}

impl FromStr for LeaseId {
    type Err = ParseLeaseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [owner, dseq, gseq, provider] = parts.as_slice() else {
            return Err(ParseLeaseIdError::WrongArity(parts.len()));
        };

        if owner.is_empty() {
            return Err(ParseLeaseIdError::Empty("owner"));
        }
        if provider.is_empty() {
            return Err(ParseLeaseIdError::Empty("provider"));
        }

        let dseq = dseq
            .parse()
            .map_err(|_| ParseLeaseIdError::InvalidSequence {
                field: "dseq",
                value: dseq.to_string(),
            })?;
        let gseq = gseq
            .parse()
            .map_err(|_| ParseLeaseIdError::InvalidSequence {
                field: "gseq",
                value: gseq.to_string(),
            })?;

        Ok(Self::new(*owner, dseq, gseq, *provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_id_display_parse() {
        let id = LeaseId::new("tenant1", 42, 1, "provider1");
        let display = id.to_string();
        assert_eq!(display, "tenant1/42/1/provider1");
        assert_eq!(display.parse::<LeaseId>().unwrap(), id);
    }

    #[test]
    fn test_lease_id_parse_errors() {
        assert_eq!(
            "a/1/2".parse::<LeaseId>(),
            Err(ParseLeaseIdError::WrongArity(3))
        );
        assert_eq!(
            "/1/2/p".parse::<LeaseId>(),
            Err(ParseLeaseIdError::Empty("owner"))
        );
        assert!(matches!(
            "a/x/2/p".parse::<LeaseId>(),
            Err(ParseLeaseIdError::InvalidSequence { field: "dseq", .. })
        ));
    }
}
