//! Observed liveness: the latest will status plus its current verdict.
//!
//! The owner of a monitor calls [`LivenessMonitor::tick`] once per second
//! while the verdict is on screen, and [`LivenessMonitor::update_status`]
//! whenever a heartbeat or registry re-fetch produces a new status. Both
//! recompute immediately.

use crate::liveness::{evaluate, Liveness};
use crate::will::WillStatus;

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    status: Option<WillStatus>,
    verdict: Liveness,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self {
            status: None,
            verdict: Liveness::NoProtocol,
        }
    }

    /// Replace the observed status and recompute at `now`.
    pub fn update_status(&mut self, status: Option<WillStatus>, now: Option<u64>) -> Liveness {
        self.status = status;
        self.recompute(now)
    }

    /// Recompute at `now` with the current status.
    pub fn tick(&mut self, now: Option<u64>) -> Liveness {
        self.recompute(now)
    }

    /// Forget the status (logout or unavailable registry).
    pub fn clear(&mut self) {
        self.status = None;
        self.verdict = Liveness::NoProtocol;
    }

    pub fn verdict(&self) -> Liveness {
        self.verdict
    }

    pub fn status(&self) -> Option<&WillStatus> {
        self.status.as_ref()
    }

    fn recompute(&mut self, now: Option<u64>) -> Liveness {
        let verdict = evaluate(self.status.as_ref(), now);
        if verdict.is_expired() != self.verdict.is_expired()
            || verdict.has_protocol() != self.verdict.has_protocol()
        {
            log::info!("Liveness changed: {} -> {}", self.verdict, verdict);
        }
        self.verdict = verdict;
        verdict
    }
}
