//! Wall-clock sources.
//!
//! Time is whole seconds since the Unix epoch. A clock that cannot produce a
//! reading returns `None`; callers treat that as "unavailable" and fail closed.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time in seconds since the epoch.
pub trait Clock: Send + Sync {
    /// Current time, or `None` if the source is unavailable.
    fn now(&self) -> Option<u64>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Option<u64> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Option<u64> {
        (**self).now()
    }
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<u64> {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Some(d.as_secs()),
            Err(e) => {
                log::warn!("System clock is before the Unix epoch: {}", e);
                None
            }
        }
    }
}

/// A manually driven clock shared between clones.
///
/// Used by tests and by the local registry in simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<Option<u64>>>,
}

impl ManualClock {
    /// Create a clock reading `now`.
    pub fn at(now: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(now))),
        }
    }

    /// Create a clock with no reading.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Set the current reading.
    pub fn set(&self, now: u64) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(now);
        }
    }

    /// Move the clock forward. No-op while unavailable.
    pub fn advance(&self, secs: u64) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(now) = guard.as_mut() {
                *now = now.saturating_add(secs);
            }
        }
    }

    /// Drop the reading, making the clock unavailable.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<u64> {
        self.inner.lock().map(|guard| *guard).unwrap_or(None)
    }
}
