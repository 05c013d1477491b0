//! Refresh tickets: last-write-wins ordering for overlapping fetches.
//!
//! Every remote fetch the controller asks for carries a ticket. A result is
//! applied only if its ticket is at least as new as the last one applied for
//! the same kind, and only if it belongs to the current login. Results that
//! arrive after logout (or from an earlier session) are dropped.

use std::collections::HashMap;

/// What a refresh fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefreshKind {
    Address,
    Balance,
    WillStatus,
    Claims,
}

impl RefreshKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshKind::Address => "address",
            RefreshKind::Balance => "balance",
            RefreshKind::WillStatus => "will status",
            RefreshKind::Claims => "claims",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub kind: RefreshKind,
    /// Login epoch the request was issued in.
    pub epoch: u64,
    /// Monotonic sequence number, shared across kinds.
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct RefreshTracker {
    epoch: u64,
    next_seq: u64,
    applied: HashMap<RefreshKind, u64>,
    requested_at: HashMap<RefreshKind, u64>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new login epoch. Outstanding tickets become stale.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.applied.clear();
        self.requested_at.clear();
    }

    /// Issue a ticket for a new fetch of `kind`.
    pub fn issue(&mut self, kind: RefreshKind, now: Option<u64>) -> RefreshTicket {
        self.next_seq += 1;
        if let Some(now) = now {
            self.requested_at.insert(kind, now);
        }
        RefreshTicket {
            kind,
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }

    /// Whether a result carrying `ticket` should be applied.
    ///
    /// The same ticket may be accepted more than once (a cached value
    /// followed by the fresh one).
    pub fn accept(&mut self, ticket: RefreshTicket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let applied = self.applied.entry(ticket.kind).or_insert(0);
        if ticket.seq < *applied {
            return false;
        }
        *applied = ticket.seq;
        true
    }

    /// Whether `kind` was requested less than `every_secs` before `now`.
    pub fn requested_within(&self, kind: RefreshKind, now: u64, every_secs: u64) -> bool {
        self.requested_at
            .get(&kind)
            .is_some_and(|at| now.saturating_sub(*at) < every_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_wins() {
        let mut tracker = RefreshTracker::new();
        let first = tracker.issue(RefreshKind::Balance, None);
        let second = tracker.issue(RefreshKind::Balance, None);

        assert!(tracker.accept(second));
        // The older request resolved last: dropped
        assert!(!tracker.accept(first));
    }

    #[test]
    fn test_same_ticket_accepted_twice() {
        let mut tracker = RefreshTracker::new();
        let ticket = tracker.issue(RefreshKind::Balance, None);
        assert!(tracker.accept(ticket));
        assert!(tracker.accept(ticket));
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut tracker = RefreshTracker::new();
        let address = tracker.issue(RefreshKind::Address, None);
        let claims = tracker.issue(RefreshKind::Claims, None);
        assert!(tracker.accept(claims));
        assert!(tracker.accept(address));
    }

    #[test]
    fn test_reset_drops_outstanding_tickets() {
        let mut tracker = RefreshTracker::new();
        let ticket = tracker.issue(RefreshKind::WillStatus, None);
        tracker.reset();
        assert!(!tracker.accept(ticket));

        let fresh = tracker.issue(RefreshKind::WillStatus, None);
        assert_eq!(fresh.epoch, ticket.epoch + 1);
        assert!(tracker.accept(fresh));
    }

    #[test]
    fn test_requested_within() {
        let mut tracker = RefreshTracker::new();
        assert!(!tracker.requested_within(RefreshKind::Claims, 100, 60));
        tracker.issue(RefreshKind::Claims, Some(100));
        assert!(tracker.requested_within(RefreshKind::Claims, 159, 60));
        assert!(!tracker.requested_within(RefreshKind::Claims, 160, 60));
    }
}
