//! Requests the controller emits and the results fed back to it.
//!
//! The controller never performs I/O. It returns [`SessionAction`]s, a
//! driver executes them against the registry and cache, and each outcome
//! comes back as a [`SessionEvent`].

use crate::panels::{AddressDisplay, BalanceReading};
use crate::refresh::RefreshTicket;
use deadswitch_core::{Identity, InheritanceClaim, WillStatus};
use deadswitch_registry::{RegisterWill, RegistryError};

/// Work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Resolve the caller's custody address
    RefreshAddress {
        ticket: RefreshTicket,
        caller: Identity,
        /// Bypass the address cache and re-fetch the key
        force: bool,
    },

    /// Fetch the confirmed balance of `address`
    RefreshBalance {
        ticket: RefreshTicket,
        address: String,
        force: bool,
    },

    /// Fetch the caller's will status
    RefreshWillStatus {
        ticket: RefreshTicket,
        caller: Identity,
    },

    /// Fetch wills naming the caller as beneficiary
    RefreshClaims {
        ticket: RefreshTicket,
        caller: Identity,
    },

    /// Proof of life. Sent once, never retried.
    BroadcastHeartbeat { epoch: u64, caller: Identity },

    /// Register or replace the caller's will
    RegisterWill {
        epoch: u64,
        caller: Identity,
        request: RegisterWill,
    },

    /// Claim an expired will. Sent once, never retried.
    SubmitClaim {
        epoch: u64,
        caller: Identity,
        owner: Identity,
    },
}

/// Outcome of a [`SessionAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AddressLoaded {
        ticket: RefreshTicket,
        result: Result<AddressDisplay, RegistryError>,
    },

    /// May arrive twice for one ticket: a stale cached value, then the fresh one
    BalanceLoaded {
        ticket: RefreshTicket,
        address: String,
        result: Result<BalanceReading, RegistryError>,
    },

    WillStatusLoaded {
        ticket: RefreshTicket,
        result: Result<Option<WillStatus>, RegistryError>,
    },

    ClaimsLoaded {
        ticket: RefreshTicket,
        result: Result<Vec<InheritanceClaim>, RegistryError>,
    },

    HeartbeatCompleted {
        epoch: u64,
        result: Result<(), RegistryError>,
    },

    WillRegistered {
        epoch: u64,
        result: Result<String, RegistryError>,
    },

    ClaimCompleted {
        epoch: u64,
        owner: Identity,
        /// Released secret
        result: Result<Vec<u8>, RegistryError>,
    },
}

impl SessionEvent {
    /// Login epoch the originating action was issued in.
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::AddressLoaded { ticket, .. }
            | SessionEvent::BalanceLoaded { ticket, .. }
            | SessionEvent::WillStatusLoaded { ticket, .. }
            | SessionEvent::ClaimsLoaded { ticket, .. } => ticket.epoch,
            SessionEvent::HeartbeatCompleted { epoch, .. }
            | SessionEvent::WillRegistered { epoch, .. }
            | SessionEvent::ClaimCompleted { epoch, .. } => *epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::RefreshKind;

    fn ticket(epoch: u64) -> RefreshTicket {
        RefreshTicket {
            kind: RefreshKind::Claims,
            epoch,
            seq: 1,
        }
    }

    #[test]
    fn test_event_epoch() {
        let loaded = SessionEvent::ClaimsLoaded {
            ticket: ticket(3),
            result: Ok(vec![]),
        };
        assert_eq!(loaded.epoch(), 3);

        let failed = SessionEvent::HeartbeatCompleted {
            epoch: 5,
            result: Err(RegistryError::RemoteCallFailed("timeout".into())),
        };
        assert_eq!(failed.epoch(), 5);
    }
}
