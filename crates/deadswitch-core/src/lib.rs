//! deadswitch Core
//!
//! Shared model types and the liveness clock for deadswitch.
//!
//! # Liveness
//!
//! A will is alive while `last_active + heartbeat_interval > now`. Once the
//! interval has fully elapsed the owner is presumed gone and the beneficiary
//! may claim:
//!
//! ```text
//! last_active                                   last_active + interval
//!     |---------- Alive { remaining_secs } ----------|--- Expired --->
//! ```
//!
//! When no will exists, or the clock cannot be read, the verdict is
//! [`Liveness::NoProtocol`] (sentinel `-1`), which is never the same as
//! [`Liveness::Expired`] (`0`).

pub mod clock;
pub mod liveness;
pub mod monitor;
pub mod will;

pub use clock::{Clock, ManualClock, SystemClock};
pub use liveness::{
    assess, evaluate, format_countdown, rank_claims, time_remaining, HeartbeatAction,
    HeartbeatConfig, HeartbeatStatus, Liveness, LivenessError, NO_PROTOCOL_SENTINEL,
};
pub use monitor::LivenessMonitor;
pub use will::{Identity, InheritanceClaim, ModelError, WillRecord, WillStatus};
