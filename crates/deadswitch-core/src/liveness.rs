//! Liveness evaluation for registered wills.
//!
//! Pure logic — no I/O, no async. Takes a will's heartbeat timing and the
//! current time, returns a verdict. The caller (session controller, registry,
//! daemon) decides what to do with it.
//!
//! # Urgency
//!
//! Besides the binary alive/expired verdict, the elapsed fraction of the
//! heartbeat interval maps to a recommended action:
//!
//! ```text
//! |--- Healthy ---|--- CheckinRecommended ---|--- CheckinRequired ---|--- Expired
//! 0%             50%                        90%                    100%
//! ```
//!
//! Thresholds are configurable.

use crate::will::{InheritanceClaim, WillStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining-time value reported when no will is registered.
pub const NO_PROTOCOL_SENTINEL: i64 = -1;

/// Seconds left before a will expires, saturating at zero.
pub fn time_remaining(last_active: u64, heartbeat_interval_secs: u64, now: u64) -> u64 {
    last_active
        .saturating_add(heartbeat_interval_secs)
        .saturating_sub(now)
}

/// Liveness verdict for the owner of a will.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    /// No will registered, or inputs unavailable.
    NoProtocol,
    /// Heartbeat interval still running.
    Alive { remaining_secs: u64 },
    /// Heartbeat interval fully elapsed.
    Expired,
}

impl Liveness {
    /// Remaining seconds, with `-1` for [`Liveness::NoProtocol`] and `0` for
    /// [`Liveness::Expired`].
    pub fn remaining_secs(&self) -> i64 {
        match self {
            Liveness::NoProtocol => NO_PROTOCOL_SENTINEL,
            Liveness::Alive { remaining_secs } => {
                i64::try_from(*remaining_secs).unwrap_or(i64::MAX)
            }
            Liveness::Expired => 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Liveness::Expired)
    }

    pub fn has_protocol(&self) -> bool {
        !matches!(self, Liveness::NoProtocol)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::NoProtocol => f.write_str("NO PROTOCOL INITIALIZED"),
            Liveness::Alive { remaining_secs } => {
                write!(f, "ALIVE ({})", format_countdown(*remaining_secs))
            }
            Liveness::Expired => f.write_str("PROTOCOL ACTIVATED"),
        }
    }
}

/// Evaluate liveness.
///
/// Fails closed: a missing status, a missing clock reading or a zero
/// heartbeat interval all yield [`Liveness::NoProtocol`], never
/// [`Liveness::Expired`].
pub fn evaluate(status: Option<&WillStatus>, now: Option<u64>) -> Liveness {
    let (Some(status), Some(now)) = (status, now) else {
        return Liveness::NoProtocol;
    };
    if status.heartbeat_interval_secs == 0 {
        log::warn!("Will status has a zero heartbeat interval; reporting no protocol");
        return Liveness::NoProtocol;
    }
    match time_remaining(status.last_active, status.heartbeat_interval_secs, now) {
        0 => Liveness::Expired,
        remaining_secs => Liveness::Alive { remaining_secs },
    }
}

/// Render seconds as `DDD:HH:MM:SS`.
pub fn format_countdown(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:03}:{:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Heartbeat configuration — when to recommend a check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Fraction of the interval elapsed before recommending a heartbeat (0.0–1.0).
    /// Default: 0.5.
    pub checkin_threshold: f64,

    /// Fraction of the interval elapsed before a heartbeat is critical (0.0–1.0).
    /// Default: 0.9.
    pub critical_threshold: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            checkin_threshold: 0.5,
            critical_threshold: 0.9,
        }
    }
}

impl HeartbeatConfig {
    /// Validate that thresholds are sensible.
    pub fn validate(&self) -> Result<(), LivenessError> {
        if self.checkin_threshold <= 0.0 || self.checkin_threshold >= 1.0 {
            return Err(LivenessError::InvalidThreshold(
                "checkin_threshold must be between 0.0 and 1.0 exclusive".into(),
            ));
        }
        if self.critical_threshold <= self.checkin_threshold || self.critical_threshold >= 1.0 {
            return Err(LivenessError::InvalidThreshold(
                "critical_threshold must be between checkin_threshold and 1.0 exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// What the heartbeat recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartbeatAction {
    /// Far from expiry. No action needed.
    Healthy,
    /// Past the check-in threshold. Should send a heartbeat soon.
    CheckinRecommended,
    /// Past the critical threshold. Must send a heartbeat now.
    CheckinRequired,
    /// Interval elapsed. Beneficiary can claim.
    Expired,
}

impl HeartbeatAction {
    fn priority(self) -> u8 {
        match self {
            HeartbeatAction::Expired => 0,
            HeartbeatAction::CheckinRequired => 1,
            HeartbeatAction::CheckinRecommended => 2,
            HeartbeatAction::Healthy => 3,
        }
    }
}

/// Full heartbeat assessment of a will.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    pub liveness: Liveness,
    /// Fraction of the interval elapsed (0.0–1.0+).
    pub elapsed_fraction: f64,
    pub action: HeartbeatAction,
}

/// Errors from liveness evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LivenessError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Heartbeat interval must be greater than zero")]
    ZeroInterval,
}

/// Assess a will's urgency at `now`.
pub fn assess(
    status: &WillStatus,
    now: u64,
    config: &HeartbeatConfig,
) -> Result<HeartbeatStatus, LivenessError> {
    if status.heartbeat_interval_secs == 0 {
        return Err(LivenessError::ZeroInterval);
    }
    let liveness = evaluate(Some(status), Some(now));
    let elapsed = now.saturating_sub(status.last_active);
    let elapsed_fraction = elapsed as f64 / status.heartbeat_interval_secs as f64;

    let action = if liveness.is_expired() {
        HeartbeatAction::Expired
    } else if elapsed_fraction >= config.critical_threshold {
        HeartbeatAction::CheckinRequired
    } else if elapsed_fraction >= config.checkin_threshold {
        HeartbeatAction::CheckinRecommended
    } else {
        HeartbeatAction::Healthy
    };

    Ok(HeartbeatStatus {
        liveness,
        elapsed_fraction,
        action,
    })
}

/// Assess several claims and sort them most urgent first.
///
/// Claims with a zero interval are skipped.
pub fn rank_claims<'a>(
    claims: &'a [InheritanceClaim],
    now: u64,
    config: &HeartbeatConfig,
) -> Vec<(&'a InheritanceClaim, HeartbeatStatus)> {
    let mut ranked: Vec<(&InheritanceClaim, HeartbeatStatus)> = claims
        .iter()
        .filter_map(|claim| match assess(&claim.status(), now, config) {
            Ok(status) => Some((claim, status)),
            Err(e) => {
                log::warn!("Skipping claim from {}: {}", claim.owner, e);
                None
            }
        })
        .collect();

    ranked.sort_by(|(_, a), (_, b)| {
        a.action.priority().cmp(&b.action.priority()).then(
            a.elapsed_fraction
                .partial_cmp(&b.elapsed_fraction)
                .unwrap_or(std::cmp::Ordering::Equal)
                .reverse(),
        )
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::will::Identity;

    fn status(last_active: u64, interval: u64) -> WillStatus {
        WillStatus {
            heartbeat_interval_secs: interval,
            last_active,
        }
    }

    fn claim(owner: &str, last_active: u64, interval: u64) -> InheritanceClaim {
        InheritanceClaim {
            owner: Identity::new(owner).unwrap(),
            beneficiary_address: "tb1qheir".into(),
            heartbeat_interval_secs: interval,
            last_active,
            time_remaining_secs: 0,
            is_expired: false,
        }
    }

    #[test]
    fn test_expired_exactly_at_deadline() {
        let verdict = evaluate(Some(&status(1000, 300)), Some(1300));
        assert_eq!(verdict, Liveness::Expired);
        assert_eq!(verdict.remaining_secs(), 0);
        assert!(verdict.is_expired());
    }

    #[test]
    fn test_alive_before_deadline() {
        let verdict = evaluate(Some(&status(1000, 300)), Some(1200));
        assert_eq!(verdict, Liveness::Alive { remaining_secs: 100 });
        assert_eq!(verdict.remaining_secs(), 100);
        assert!(!verdict.is_expired());
    }

    #[test]
    fn test_remaining_matches_formula() {
        for (last, interval, now) in [(0u64, 1u64, 0u64), (10, 50, 59), (10, 50, 60), (10, 50, 500), (5, 5, 5)] {
            let expected = (last + interval).saturating_sub(now);
            let verdict = evaluate(Some(&status(last, interval)), Some(now));
            assert_eq!(verdict.remaining_secs(), expected as i64);
            assert_eq!(verdict.is_expired(), expected == 0);
        }
    }

    #[test]
    fn test_no_record_is_sentinel_not_expired() {
        let verdict = evaluate(None, Some(1300));
        assert_eq!(verdict, Liveness::NoProtocol);
        assert_eq!(verdict.remaining_secs(), NO_PROTOCOL_SENTINEL);
        assert_ne!(verdict.remaining_secs(), Liveness::Expired.remaining_secs());
        assert!(!verdict.is_expired());
        assert!(!verdict.has_protocol());
    }

    #[test]
    fn test_missing_clock_fails_closed() {
        assert_eq!(evaluate(Some(&status(1000, 300)), None), Liveness::NoProtocol);
    }

    #[test]
    fn test_zero_interval_fails_closed() {
        assert_eq!(evaluate(Some(&status(1000, 0)), Some(5000)), Liveness::NoProtocol);
    }

    #[test]
    fn test_future_last_active_does_not_overflow() {
        let verdict = evaluate(Some(&status(u64::MAX - 10, 300)), Some(0));
        assert_eq!(verdict.remaining_secs(), i64::MAX);
        assert_eq!(time_remaining(2000, 300, 1000), 1300);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "000:00:00:00");
        assert_eq!(format_countdown(7_776_000), "090:00:00:00");
        assert_eq!(format_countdown(86_400 + 3600 + 61), "001:01:01:01");
    }

    #[test]
    fn test_display_distinguishes_sentinels() {
        assert_eq!(Liveness::NoProtocol.to_string(), "NO PROTOCOL INITIALIZED");
        assert_eq!(Liveness::Expired.to_string(), "PROTOCOL ACTIVATED");
        assert_eq!(
            Liveness::Alive { remaining_secs: 61 }.to_string(),
            "ALIVE (000:00:01:01)"
        );
    }

    #[test]
    fn test_assess_thresholds() {
        let config = HeartbeatConfig::default();
        let s = status(0, 1000);

        assert_eq!(assess(&s, 100, &config).unwrap().action, HeartbeatAction::Healthy);
        assert_eq!(
            assess(&s, 500, &config).unwrap().action,
            HeartbeatAction::CheckinRecommended
        );
        assert_eq!(
            assess(&s, 900, &config).unwrap().action,
            HeartbeatAction::CheckinRequired
        );
        let expired = assess(&s, 1000, &config).unwrap();
        assert_eq!(expired.action, HeartbeatAction::Expired);
        assert!(expired.liveness.is_expired());
    }

    #[test]
    fn test_assess_zero_interval_is_error() {
        let config = HeartbeatConfig::default();
        assert_eq!(
            assess(&status(0, 0), 10, &config),
            Err(LivenessError::ZeroInterval)
        );
    }

    #[test]
    fn test_config_validation() {
        let bad = HeartbeatConfig {
            checkin_threshold: 0.0,
            critical_threshold: 0.9,
        };
        assert!(bad.validate().is_err());

        let bad = HeartbeatConfig {
            checkin_threshold: 0.5,
            critical_threshold: 0.4,
        };
        assert!(bad.validate().is_err());

        let bad = HeartbeatConfig {
            checkin_threshold: 0.5,
            critical_threshold: 1.0,
        };
        assert!(bad.validate().is_err());

        assert!(HeartbeatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rank_claims_most_urgent_first() {
        let config = HeartbeatConfig::default();
        let claims = vec![
            claim("healthy", 900, 1000),
            claim("expired", 0, 500),
            claim("broken", 0, 0),
            claim("recommended", 300, 1000),
        ];

        let ranked = rank_claims(&claims, 1000, &config);
        let owners: Vec<&str> = ranked.iter().map(|(c, _)| c.owner.as_str()).collect();
        assert_eq!(owners, vec!["expired", "recommended", "healthy"]);
        assert_eq!(ranked[0].1.action, HeartbeatAction::Expired);
    }
}
