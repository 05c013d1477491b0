//! Will records, status snapshots and beneficiary claims.

use crate::liveness::time_remaining;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from constructing model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Identity must not be empty")]
    EmptyIdentity,

    #[error("Heartbeat interval must be greater than zero")]
    ZeroInterval,
}

/// Opaque identifier of an owner, beneficiary or caller.
///
/// Always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Heartbeat timing of the caller's own will, as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WillStatus {
    /// Seconds the owner may stay silent before the will expires.
    pub heartbeat_interval_secs: u64,
    /// Last heartbeat (seconds since epoch).
    pub last_active: u64,
}

impl WillStatus {
    /// Instant at which the will expires.
    pub fn deadline(&self) -> u64 {
        self.last_active.saturating_add(self.heartbeat_interval_secs)
    }
}

/// One registered dead-man's-switch instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WillRecord {
    pub owner: Identity,
    /// Who may claim once the will expires.
    pub beneficiary: Identity,
    /// Where custody is transferred on expiration.
    pub beneficiary_address: String,
    pub heartbeat_interval_secs: u64,
    pub last_active: u64,
    /// Sealed payload released to the beneficiary. `None` when registered empty.
    pub encrypted_payload: Option<Vec<u8>>,
}

impl WillRecord {
    /// Create a record whose clock starts at `now`.
    pub fn new(
        owner: Identity,
        beneficiary: Identity,
        beneficiary_address: impl Into<String>,
        heartbeat_interval_secs: u64,
        encrypted_payload: Vec<u8>,
        now: u64,
    ) -> Result<Self, ModelError> {
        if heartbeat_interval_secs == 0 {
            return Err(ModelError::ZeroInterval);
        }
        Ok(Self {
            owner,
            beneficiary,
            beneficiary_address: beneficiary_address.into(),
            heartbeat_interval_secs,
            last_active: now,
            encrypted_payload: if encrypted_payload.is_empty() {
                None
            } else {
                Some(encrypted_payload)
            },
        })
    }

    pub fn status(&self) -> WillStatus {
        WillStatus {
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            last_active: self.last_active,
        }
    }

    /// Record a heartbeat. `last_active` never moves backwards.
    pub fn touch(&mut self, now: u64) {
        self.last_active = self.last_active.max(now);
    }
}

/// A beneficiary's view of one will.
///
/// `is_expired == (time_remaining_secs == 0)` holds for every value built by
/// [`InheritanceClaim::project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceClaim {
    pub owner: Identity,
    pub beneficiary_address: String,
    pub heartbeat_interval_secs: u64,
    pub last_active: u64,
    pub time_remaining_secs: u64,
    pub is_expired: bool,
}

impl InheritanceClaim {
    /// Project a will record at instant `now`.
    pub fn project(record: &WillRecord, now: u64) -> Self {
        let remaining = time_remaining(record.last_active, record.heartbeat_interval_secs, now);
        Self {
            owner: record.owner.clone(),
            beneficiary_address: record.beneficiary_address.clone(),
            heartbeat_interval_secs: record.heartbeat_interval_secs,
            last_active: record.last_active,
            time_remaining_secs: remaining,
            is_expired: remaining == 0,
        }
    }

    pub fn status(&self) -> WillStatus {
        WillStatus {
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            last_active: self.last_active,
        }
    }

    /// Remaining time recomputed locally at `now`, for display between fetches.
    pub fn remaining_at(&self, now: u64) -> u64 {
        time_remaining(self.last_active, self.heartbeat_interval_secs, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn test_identity_trims_and_rejects_empty() {
        assert_eq!(id("  alice ").as_str(), "alice");
        assert_eq!(Identity::new("   "), Err(ModelError::EmptyIdentity));
        assert_eq!("".parse::<Identity>(), Err(ModelError::EmptyIdentity));
    }

    #[test]
    fn test_identity_serde_validates() {
        let json = serde_json::to_string(&id("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
    }

    #[test]
    fn test_record_empty_payload_is_absent() {
        let record = WillRecord::new(id("owner"), id("heir"), "tb1qheir", 300, vec![], 1000).unwrap();
        assert_eq!(record.encrypted_payload, None);
        assert_eq!(record.last_active, 1000);

        let record =
            WillRecord::new(id("owner"), id("heir"), "tb1qheir", 300, vec![1, 2], 1000).unwrap();
        assert_eq!(record.encrypted_payload, Some(vec![1, 2]));
    }

    #[test]
    fn test_record_rejects_zero_interval() {
        let err = WillRecord::new(id("owner"), id("heir"), "tb1qheir", 0, vec![], 1000);
        assert_eq!(err, Err(ModelError::ZeroInterval));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut record =
            WillRecord::new(id("owner"), id("heir"), "tb1qheir", 300, vec![], 1000).unwrap();
        record.touch(1200);
        assert_eq!(record.last_active, 1200);
        record.touch(1100);
        assert_eq!(record.last_active, 1200);
    }

    #[test]
    fn test_claim_projection() {
        let record = WillRecord::new(id("owner"), id("heir"), "tb1qheir", 300, vec![], 1000).unwrap();

        let claim = InheritanceClaim::project(&record, 1200);
        assert_eq!(claim.time_remaining_secs, 100);
        assert!(!claim.is_expired);

        let claim = InheritanceClaim::project(&record, 1300);
        assert_eq!(claim.time_remaining_secs, 0);
        assert!(claim.is_expired);
        assert_eq!(claim.remaining_at(1250), 50);
        assert_eq!(claim.status().deadline(), 1300);
    }
}
