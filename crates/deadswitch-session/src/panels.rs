//! Display state of the data panels shown by the monitor views.

use serde::{Deserialize, Serialize};

/// Load state of one remotely fetched value.
///
/// A failed refresh keeps the last good value around but is always reported
/// as failed; it never reads as a silent success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataState<T> {
    NotLoaded,
    Ready(T),
    Failed { message: String, last: Option<T> },
}

impl<T> Default for DataState<T> {
    fn default() -> Self {
        DataState::NotLoaded
    }
}

impl<T> DataState<T> {
    /// Current value, if one has loaded successfully.
    pub fn value(&self) -> Option<&T> {
        match self {
            DataState::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Best value available for display, including one kept after a failure.
    pub fn last_known(&self) -> Option<&T> {
        match self {
            DataState::Ready(value) => Some(value),
            DataState::Failed { last, .. } => last.as_ref(),
            DataState::NotLoaded => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DataState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DataState::Failed { .. })
    }

    /// Mark failed, keeping the last known value.
    pub fn fail(&mut self, message: impl Into<String>) {
        let last = match std::mem::take(self) {
            DataState::Ready(value) => Some(value),
            DataState::Failed { last, .. } => last,
            DataState::NotLoaded => None,
        };
        *self = DataState::Failed {
            message: message.into(),
            last,
        };
    }
}

/// The custody address panel.
///
/// A key that cannot be converted is still shown, raw, next to the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDisplay {
    /// Custody key exactly as returned by the registry.
    pub raw: String,
    pub address: Option<String>,
    pub conversion_error: Option<String>,
}

impl AddressDisplay {
    pub fn resolved(raw: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            address: Some(address.into()),
            conversion_error: None,
        }
    }

    pub fn unconverted(raw: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            address: None,
            conversion_error: Some(error.into()),
        }
    }
}

/// Confirmed balance of the custody address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReading {
    pub sats: u64,
    /// When the value was fetched from the registry, if the clock was readable.
    pub fetched_at: Option<u64>,
    /// Served from cache past its TTL while a refresh is in flight.
    pub stale: bool,
}
