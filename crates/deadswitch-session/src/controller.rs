//! Session and view state machine.
//!
//! [`SessionController`] owns everything the client shows: the active view,
//! the liveness verdict, the data panels, and a queue of user notices. It
//! performs no I/O. Inputs are user intents, clock ticks, and
//! [`SessionEvent`]s carrying remote results; outputs are
//! [`SessionAction`]s for a driver to execute.
//!
//! ```text
//!                      login (not critical)
//!   Unauthenticated ─────────────────────────▶ ProtocolSetup ◀──┐
//!        │   ▲                                   │     ▲  close │
//!        │   └──────────── logout ───────────────┤     │ (not   │
//!        │  login (critical)               close │     │ crit.) │
//!        ▼                                       ▼     │        │
//!   CriticalAlert ◀──────── close (critical) ─── Monitor ───────┘
//!        │                                       ▲
//!        └──────────────── close ────────────────┘
//! ```
//!
//! While on ProtocolSetup, a fresh false→true transition of the critical
//! condition switches to CriticalAlert once, unless the user has already
//! navigated away from ProtocolSetup by hand since login.

use crate::events::{SessionAction, SessionEvent};
use crate::panels::{AddressDisplay, BalanceReading, DataState};
use crate::refresh::{RefreshKind, RefreshTracker};
use deadswitch_address::{verify_address, Network};
use deadswitch_core::{
    assess, rank_claims, HeartbeatConfig, HeartbeatStatus, Identity, InheritanceClaim, Liveness,
    LivenessMonitor, WillStatus,
};
use deadswitch_registry::{RegisterWill, RegistryError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

pub const SECS_PER_DAY: u64 = 86_400;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    Unauthenticated,
    ProtocolSetup,
    Monitor,
    CriticalAlert,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Unauthenticated => "unauthenticated",
            View::ProtocolSetup => "setup",
            View::Monitor => "monitor",
            View::CriticalAlert => "alert",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Access denied: not authenticated")]
    AccessDenied,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Already authenticated as {0}")]
    AlreadyAuthenticated(Identity),

    #[error("Cannot navigate to {0}")]
    InvalidTarget(View),

    #[error("No protocol registered")]
    NoProtocolRegistered,

    #[error("Invalid will: {0}")]
    InvalidWill(String),

    #[error("No pending claim from {0}")]
    UnknownClaim(Identity),

    #[error("Owner {0} is still alive")]
    ClaimNotExpired(Identity),

    #[error("Will of {0} already claimed")]
    AlreadyClaimed(Identity),

    #[error("A {0} request is already in flight")]
    InFlight(&'static str),

    #[error("Custody address not resolved")]
    AddressUnavailable,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Network for derived and beneficiary addresses.
    pub network: Network,
    /// Accept registrations with an empty digital will.
    pub allow_empty_payload: bool,
    /// Balance values older than this are refreshed.
    pub balance_ttl_secs: u64,
    /// Re-fetch claims this often while logged in. 0 disables.
    pub claims_poll_secs: u64,
    /// Oldest notices are dropped past this many.
    pub notice_capacity: usize,
    pub heartbeat: HeartbeatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            allow_empty_payload: true,
            balance_ttl_secs: 300,
            claims_poll_secs: 60,
            notice_capacity: 32,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

/// Registration form input, validated by [`SessionController::request_register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillDraft {
    pub beneficiary: String,
    pub beneficiary_address: String,
    pub heartbeat_interval_secs: u64,
    /// Sealed digital will. May be empty if the config allows it.
    pub encrypted_payload: Vec<u8>,
}

impl WillDraft {
    /// Draft with the heartbeat interval given in days.
    pub fn with_days(
        beneficiary: impl Into<String>,
        beneficiary_address: impl Into<String>,
        days: u64,
        encrypted_payload: Vec<u8>,
    ) -> Self {
        Self {
            beneficiary: beneficiary.into(),
            beneficiary_address: beneficiary_address.into(),
            heartbeat_interval_secs: days.saturating_mul(SECS_PER_DAY),
            encrypted_payload,
        }
    }

    fn validate(self, config: &SessionConfig) -> Result<RegisterWill, SessionError> {
        let beneficiary = Identity::new(self.beneficiary)
            .map_err(|e| SessionError::InvalidWill(e.to_string()))?;

        let address = self.beneficiary_address.trim();
        if address.is_empty() {
            return Err(SessionError::InvalidWill(
                "beneficiary address is required".into(),
            ));
        }
        verify_address(address, config.network)
            .map_err(|e| SessionError::InvalidWill(e.to_string()))?;

        if self.heartbeat_interval_secs == 0 {
            return Err(SessionError::InvalidWill(
                "heartbeat interval must be greater than zero".into(),
            ));
        }
        if self.encrypted_payload.is_empty() && !config.allow_empty_payload {
            return Err(SessionError::InvalidWill("digital will is empty".into()));
        }

        Ok(RegisterWill {
            beneficiary,
            beneficiary_address: address.to_string(),
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            encrypted_payload: self.encrypted_payload,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user. Remote errors are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Registry data fetched during login.
#[derive(Debug, Clone)]
pub struct LoginSnapshot {
    pub will: Result<Option<WillStatus>, RegistryError>,
    pub claims: Result<Vec<InheritanceClaim>, RegistryError>,
}

/// Rising-edge detector for the critical condition.
///
/// Seeded with the state observed at login so that a condition already true
/// then does not count as a new edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    pub fn seeded(current: bool) -> Self {
        Self { previous: current }
    }

    /// Feed an observation. `None` (unknown) holds the previous state.
    /// Returns true only on a false→true transition.
    pub fn observe(&mut self, current: Option<bool>) -> bool {
        let Some(current) = current else {
            return false;
        };
        let rising = current && !self.previous;
        self.previous = current;
        rising
    }

    pub fn is_high(&self) -> bool {
        self.previous
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct SessionController {
    config: SessionConfig,
    view: View,
    identity: Option<Identity>,
    tracker: RefreshTracker,
    monitor: LivenessMonitor,
    edge: EdgeDetector,
    left_setup_manually: bool,
    clock_readable: bool,

    address: DataState<AddressDisplay>,
    balance: DataState<BalanceReading>,
    will: DataState<Option<WillStatus>>,
    claims: DataState<Vec<InheritanceClaim>>,
    unlocked: BTreeMap<Identity, Vec<u8>>,

    heartbeat_in_flight: bool,
    register_in_flight: bool,
    claims_in_flight: BTreeSet<Identity>,

    notices: VecDeque<Notice>,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            view: View::Unauthenticated,
            identity: None,
            tracker: RefreshTracker::new(),
            monitor: LivenessMonitor::new(),
            edge: EdgeDetector::default(),
            left_setup_manually: false,
            clock_readable: false,
            address: DataState::NotLoaded,
            balance: DataState::NotLoaded,
            will: DataState::NotLoaded,
            claims: DataState::NotLoaded,
            unlocked: BTreeMap::new(),
            heartbeat_in_flight: false,
            register_in_flight: false,
            claims_in_flight: BTreeSet::new(),
            notices: VecDeque::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current login epoch.
    pub fn epoch(&self) -> u64 {
        self.tracker.epoch()
    }

    pub fn liveness(&self) -> Liveness {
        self.monitor.verdict()
    }

    /// Countdown line as shown on the monitor view.
    pub fn countdown(&self) -> String {
        self.monitor.verdict().to_string()
    }

    pub fn will_status(&self) -> &DataState<Option<WillStatus>> {
        &self.will
    }

    pub fn address(&self) -> &DataState<AddressDisplay> {
        &self.address
    }

    pub fn balance(&self) -> &DataState<BalanceReading> {
        &self.balance
    }

    pub fn claims(&self) -> &DataState<Vec<InheritanceClaim>> {
        &self.claims
    }

    /// Secret released by a successful claim.
    pub fn unlocked_secret(&self, owner: &Identity) -> Option<&[u8]> {
        self.unlocked.get(owner).map(Vec::as_slice)
    }

    /// Owner's own will expired, or any fetched claim is expired.
    pub fn is_critical(&self) -> bool {
        self.monitor.verdict().is_expired() || self.has_expired_claim()
    }

    /// Heartbeat urgency of the caller's own will at `now`.
    pub fn heartbeat_advice(&self, now: u64) -> Option<HeartbeatStatus> {
        let status = self.monitor.status()?;
        assess(status, now, &self.config.heartbeat).ok()
    }

    /// Fetched claims, most urgent first.
    pub fn ranked_claims(&self, now: u64) -> Vec<(&InheritanceClaim, HeartbeatStatus)> {
        match self.claims.last_known() {
            Some(claims) => rank_claims(claims, now, &self.config.heartbeat),
            None => Vec::new(),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Enter an authenticated session with data fetched at login.
    ///
    /// Lands on CriticalAlert if the critical condition already holds,
    /// ProtocolSetup otherwise.
    pub fn authenticate(
        &mut self,
        identity: Identity,
        snapshot: LoginSnapshot,
        now: Option<u64>,
    ) -> Result<View, SessionError> {
        if let Some(current) = &self.identity {
            return Err(SessionError::AlreadyAuthenticated(current.clone()));
        }
        self.reset_session();
        self.identity = Some(identity.clone());
        self.clock_readable = now.is_some();

        let ticket = self.tracker.issue(RefreshKind::WillStatus, now);
        self.tracker.accept(ticket);
        self.apply_will_status(snapshot.will, now);

        let ticket = self.tracker.issue(RefreshKind::Claims, now);
        self.tracker.accept(ticket);
        self.apply_claims(snapshot.claims);

        let critical = self.is_critical();
        self.edge = EdgeDetector::seeded(critical);
        self.view = if critical {
            View::CriticalAlert
        } else {
            View::ProtocolSetup
        };
        info!("Authenticated as {} ({})", identity, self.view);
        Ok(self.view)
    }

    /// Terminal until the next [`authenticate`](Self::authenticate).
    /// Results of requests still in flight will be dropped.
    pub fn logout(&mut self) {
        if let Some(identity) = self.identity.take() {
            info!("Logged out {}", identity);
        }
        self.reset_session();
        self.view = View::Unauthenticated;
    }

    fn reset_session(&mut self) {
        self.tracker.reset();
        self.monitor.clear();
        self.edge = EdgeDetector::default();
        self.left_setup_manually = false;
        self.address = DataState::NotLoaded;
        self.balance = DataState::NotLoaded;
        self.will = DataState::NotLoaded;
        self.claims = DataState::NotLoaded;
        self.unlocked.clear();
        self.heartbeat_in_flight = false;
        self.register_in_flight = false;
        self.claims_in_flight.clear();
        self.notices.clear();
    }

    /// Once-per-second clock tick while logged in.
    pub fn tick(&mut self, now: Option<u64>) -> Vec<SessionAction> {
        if self.identity.is_none() {
            return Vec::new();
        }
        self.clock_readable = now.is_some();
        self.monitor.tick(now);

        let mut actions = self.check_alert(now);
        if let Some(now) = now {
            actions.extend(self.scheduled_refreshes(now));
        }
        actions
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn navigate(
        &mut self,
        target: View,
        now: Option<u64>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.caller().map_err(|_| SessionError::AccessDenied)?;
        if target == View::Unauthenticated {
            return Err(SessionError::InvalidTarget(target));
        }
        if target == self.view {
            return Ok(Vec::new());
        }
        if self.view == View::ProtocolSetup {
            self.left_setup_manually = true;
        }
        Ok(self.enter(target, now))
    }

    /// Close the current view, falling back to its parent.
    pub fn close(&mut self, now: Option<u64>) -> Result<Vec<SessionAction>, SessionError> {
        let target = match self.view {
            View::Unauthenticated => {
                self.caller().map_err(|_| SessionError::AccessDenied)?;
                return Err(SessionError::InvalidTarget(View::Unauthenticated));
            }
            View::ProtocolSetup => View::Monitor,
            View::Monitor if self.is_critical() => View::CriticalAlert,
            View::Monitor => View::ProtocolSetup,
            View::CriticalAlert => View::Monitor,
        };
        self.navigate(target, now)
    }

    fn enter(&mut self, view: View, now: Option<u64>) -> Vec<SessionAction> {
        debug!("View {} -> {}", self.view, view);
        self.view = view;
        match view {
            View::Monitor => {
                let mut actions = Vec::new();
                actions.extend(self.address_action(false, now));
                actions.extend(self.will_status_action(now));
                actions
            }
            View::CriticalAlert => self.claims_action(now).into_iter().collect(),
            View::ProtocolSetup | View::Unauthenticated => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // User requests
    // ------------------------------------------------------------------------

    /// Proof of life. Sent once; a failure is reported, never retried.
    pub fn request_heartbeat(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let caller = self.caller()?;
        if matches!(self.will, DataState::Ready(None)) {
            return Err(SessionError::NoProtocolRegistered);
        }
        if self.heartbeat_in_flight {
            return Err(SessionError::InFlight("heartbeat"));
        }
        self.heartbeat_in_flight = true;
        Ok(vec![SessionAction::BroadcastHeartbeat {
            epoch: self.tracker.epoch(),
            caller,
        }])
    }

    pub fn request_register(
        &mut self,
        draft: WillDraft,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let caller = self.caller()?;
        let request = draft.validate(&self.config)?;
        if self.register_in_flight {
            return Err(SessionError::InFlight("registration"));
        }
        self.register_in_flight = true;
        Ok(vec![SessionAction::RegisterWill {
            epoch: self.tracker.epoch(),
            caller,
            request,
        }])
    }

    /// Claim the will of `owner`. Only offered once the fetched claim is expired.
    pub fn request_claim(&mut self, owner: &Identity) -> Result<Vec<SessionAction>, SessionError> {
        let caller = self.caller()?;
        let claim = self
            .claims
            .last_known()
            .and_then(|claims| claims.iter().find(|c| &c.owner == owner))
            .ok_or_else(|| SessionError::UnknownClaim(owner.clone()))?;
        if !claim.is_expired {
            return Err(SessionError::ClaimNotExpired(owner.clone()));
        }
        if self.unlocked.contains_key(owner) {
            return Err(SessionError::AlreadyClaimed(owner.clone()));
        }
        if !self.claims_in_flight.insert(owner.clone()) {
            return Err(SessionError::InFlight("claim"));
        }
        Ok(vec![SessionAction::SubmitClaim {
            epoch: self.tracker.epoch(),
            caller,
            owner: owner.clone(),
        }])
    }

    /// Manual re-fetch of one panel. Address and balance bypass the cache.
    pub fn refresh(
        &mut self,
        kind: RefreshKind,
        now: Option<u64>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.caller()?;
        let action = match kind {
            RefreshKind::Address => self.address_action(true, now),
            RefreshKind::Balance => {
                let address = self
                    .resolved_address()
                    .map(str::to_string)
                    .ok_or(SessionError::AddressUnavailable)?;
                Some(self.balance_action(address, true, now))
            }
            RefreshKind::WillStatus => self.will_status_action(now),
            RefreshKind::Claims => self.claims_action(now),
        };
        Ok(action.into_iter().collect())
    }

    /// Re-fetch the custody key and re-derive the address, ignoring the cache.
    pub fn force_refresh_address(
        &mut self,
        now: Option<u64>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.refresh(RefreshKind::Address, now)
    }

    // ------------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------------

    /// Apply the outcome of an action. Results from an earlier login, or
    /// superseded by a newer request of the same kind, are dropped.
    pub fn apply(&mut self, event: SessionEvent, now: Option<u64>) -> Vec<SessionAction> {
        if self.identity.is_none() || event.epoch() != self.tracker.epoch() {
            debug!("Dropping result from a previous session");
            return Vec::new();
        }

        match event {
            SessionEvent::AddressLoaded { ticket, result } => {
                if !self.tracker.accept(ticket) {
                    return Vec::new();
                }
                match result {
                    Ok(display) => {
                        if let Some(e) = &display.conversion_error {
                            warn!("Custody key {} not convertible: {}", display.raw, e);
                        }
                        let address = display.address.clone();
                        self.address = DataState::Ready(display);
                        match address {
                            Some(address) => vec![self.balance_action(address, false, now)],
                            None => Vec::new(),
                        }
                    }
                    Err(e) => {
                        warn!("Address refresh failed: {}", e);
                        self.address.fail(e.to_string());
                        Vec::new()
                    }
                }
            }

            SessionEvent::BalanceLoaded {
                ticket,
                address,
                result,
            } => {
                if !self.tracker.accept(ticket) {
                    return Vec::new();
                }
                if self.resolved_address() != Some(address.as_str()) {
                    debug!("Dropping balance of superseded address {}", address);
                    return Vec::new();
                }
                match result {
                    Ok(reading) => self.balance = DataState::Ready(reading),
                    Err(e) => {
                        warn!("Balance refresh failed: {}", e);
                        self.balance.fail(e.to_string());
                    }
                }
                Vec::new()
            }

            SessionEvent::WillStatusLoaded { ticket, result } => {
                if !self.tracker.accept(ticket) {
                    return Vec::new();
                }
                self.clock_readable = now.is_some();
                self.apply_will_status(result, now);
                self.check_alert(now)
            }

            SessionEvent::ClaimsLoaded { ticket, result } => {
                if !self.tracker.accept(ticket) {
                    return Vec::new();
                }
                self.apply_claims(result);
                self.check_alert(now)
            }

            SessionEvent::HeartbeatCompleted { result, .. } => {
                self.heartbeat_in_flight = false;
                match result {
                    Ok(()) => {
                        info!("Heartbeat broadcast");
                        self.assume_heartbeat(now);
                        self.push_notice(NoticeLevel::Info, "Heartbeat sent");
                        let mut actions = self.check_alert(now);
                        actions.extend(self.will_status_action(now));
                        actions
                    }
                    Err(e) => {
                        warn!("Heartbeat failed: {}", e);
                        self.push_notice(NoticeLevel::Error, e.to_string());
                        Vec::new()
                    }
                }
            }

            SessionEvent::WillRegistered { result, .. } => {
                self.register_in_flight = false;
                match result {
                    Ok(confirmation) => {
                        info!("Will registered");
                        self.push_notice(NoticeLevel::Info, confirmation);
                        self.will_status_action(now).into_iter().collect()
                    }
                    Err(e) => {
                        warn!("Registration failed: {}", e);
                        self.push_notice(NoticeLevel::Error, e.to_string());
                        Vec::new()
                    }
                }
            }

            SessionEvent::ClaimCompleted { owner, result, .. } => {
                self.claims_in_flight.remove(&owner);
                match result {
                    Ok(secret) => {
                        info!("Claimed the will of {}", owner);
                        self.push_notice(
                            NoticeLevel::Info,
                            format!("Digital will of {} unlocked", owner),
                        );
                        self.unlocked.insert(owner, secret);
                    }
                    Err(e) => {
                        warn!("Claim on {} failed: {}", owner, e);
                        self.push_notice(NoticeLevel::Error, e.to_string());
                    }
                }
                Vec::new()
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn caller(&mut self) -> Result<Identity, SessionError> {
        match &self.identity {
            Some(identity) => Ok(identity.clone()),
            None => {
                self.push_notice(NoticeLevel::Warning, "Access denied: log in first");
                Err(SessionError::NotAuthenticated)
            }
        }
    }

    fn push_notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        if self.notices.len() >= self.config.notice_capacity.max(1) {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    fn has_expired_claim(&self) -> bool {
        self.claims
            .last_known()
            .is_some_and(|claims| claims.iter().any(|c| c.is_expired))
    }

    /// `None` when the inputs are unavailable and the previous state should hold.
    fn critical_observation(&self) -> Option<bool> {
        if self.is_critical() {
            return Some(true);
        }
        if self.will.is_failed() || self.claims.is_failed() || !self.clock_readable {
            return None;
        }
        Some(false)
    }

    fn check_alert(&mut self, now: Option<u64>) -> Vec<SessionAction> {
        let observation = self.critical_observation();
        let rising = self.edge.observe(observation);
        if rising && self.view == View::ProtocolSetup && !self.left_setup_manually {
            info!("Critical condition detected, switching to alert view");
            return self.enter(View::CriticalAlert, now);
        }
        Vec::new()
    }

    fn scheduled_refreshes(&mut self, now: u64) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        let poll = self.config.claims_poll_secs;
        if poll > 0 && !self.tracker.requested_within(RefreshKind::Claims, now, poll) {
            actions.extend(self.claims_action(Some(now)));
        }

        if self.view == View::Monitor {
            let ttl = self.config.balance_ttl_secs;
            let expired = match self.balance.value() {
                Some(reading) => reading
                    .fetched_at
                    .is_some_and(|at| now.saturating_sub(at) >= ttl),
                None => false,
            };
            if expired && !self.tracker.requested_within(RefreshKind::Balance, now, ttl) {
                if let Some(address) = self.resolved_address().map(str::to_string) {
                    actions.push(self.balance_action(address, false, Some(now)));
                }
            }
        }
        actions
    }

    fn apply_will_status(
        &mut self,
        result: Result<Option<WillStatus>, RegistryError>,
        now: Option<u64>,
    ) {
        match result {
            Ok(status) => {
                self.will = DataState::Ready(status);
                self.monitor.update_status(status, now);
            }
            Err(e) => {
                warn!("Will status unavailable: {}", e);
                self.will.fail(e.to_string());
                self.monitor.clear();
            }
        }
    }

    fn apply_claims(&mut self, result: Result<Vec<InheritanceClaim>, RegistryError>) {
        match result {
            Ok(claims) => self.claims = DataState::Ready(claims),
            Err(e) => {
                warn!("Claims unavailable: {}", e);
                self.claims.fail(e.to_string());
            }
        }
    }

    /// Show the reset countdown right away; the re-fetch confirms it.
    ///
    /// Takes a will-status ticket of its own so a fetch issued before the
    /// heartbeat cannot land afterwards and roll `last_active` back.
    fn assume_heartbeat(&mut self, now: Option<u64>) {
        let (Some(status), Some(now)) = (self.monitor.status().copied(), now) else {
            return;
        };
        let ticket = self.tracker.issue(RefreshKind::WillStatus, None);
        self.tracker.accept(ticket);
        let refreshed = WillStatus {
            last_active: status.last_active.max(now),
            ..status
        };
        self.will = DataState::Ready(Some(refreshed));
        self.monitor.update_status(Some(refreshed), Some(now));
    }

    fn resolved_address(&self) -> Option<&str> {
        self.address.value().and_then(|d| d.address.as_deref())
    }

    fn address_action(&mut self, force: bool, now: Option<u64>) -> Option<SessionAction> {
        let caller = self.identity.clone()?;
        Some(SessionAction::RefreshAddress {
            ticket: self.tracker.issue(RefreshKind::Address, now),
            caller,
            force,
        })
    }

    fn balance_action(&mut self, address: String, force: bool, now: Option<u64>) -> SessionAction {
        SessionAction::RefreshBalance {
            ticket: self.tracker.issue(RefreshKind::Balance, now),
            address,
            force,
        }
    }

    fn will_status_action(&mut self, now: Option<u64>) -> Option<SessionAction> {
        let caller = self.identity.clone()?;
        Some(SessionAction::RefreshWillStatus {
            ticket: self.tracker.issue(RefreshKind::WillStatus, now),
            caller,
        })
    }

    fn claims_action(&mut self, now: Option<u64>) -> Option<SessionAction> {
        let caller = self.identity.clone()?;
        Some(SessionAction::RefreshClaims {
            ticket: self.tracker.issue(RefreshKind::Claims, now),
            caller,
        })
    }
}
