//! File-backed registry for single-host deployments and tests.
//!
//! Applies the registry's server-side rules:
//!
//! - registration stamps `last_active = now` and stores an empty payload as absent
//! - a heartbeat moves `last_active` forward, or fails without a will
//! - pending claims are projected with the shared liveness clock
//! - a claim is released only to the beneficiary, only once expired

use crate::state::RegistryState;
use crate::{RegisterWill, Registry, RegistryError};
use deadswitch_core::{Clock, Identity, InheritanceClaim, WillRecord, WillStatus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Registry state kept in memory and optionally persisted as JSON.
pub struct LocalRegistry<C: Clock> {
    state: Mutex<RegistryState>,
    path: Option<PathBuf>,
    clock: C,
    default_custody_key: String,
    available: AtomicBool,
    balance_queries: AtomicU64,
}

impl<C: Clock> LocalRegistry<C> {
    /// Create a registry that lives only in memory.
    pub fn in_memory(clock: C, default_custody_key: impl Into<String>) -> Self {
        Self::with_state(RegistryState::default(), None, clock, default_custody_key.into())
    }

    /// Open (or create) a registry persisted at `path`.
    pub fn open(
        path: &Path,
        clock: C,
        default_custody_key: impl Into<String>,
    ) -> Result<Self, crate::StateError> {
        let state = RegistryState::load(path)?;
        log::info!(
            "Loaded registry from {} ({} wills)",
            path.display(),
            state.wills.len()
        );
        Ok(Self::with_state(
            state,
            Some(path.to_path_buf()),
            clock,
            default_custody_key.into(),
        ))
    }

    fn with_state(
        state: RegistryState,
        path: Option<PathBuf>,
        clock: C,
        default_custody_key: String,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            path,
            clock,
            default_custody_key,
            available: AtomicBool::new(true),
            balance_queries: AtomicU64::new(0),
        }
    }

    /// Override the custody key handed to one owner.
    pub fn set_custody_key(
        &self,
        owner: &Identity,
        key: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        self.commit(|state| {
            state.custody_keys.insert(owner.clone(), key);
            Ok(())
        })
    }

    /// Credit confirmed funds to an address.
    pub fn credit(&self, address: &str, sats: u64) -> Result<u64, RegistryError> {
        self.commit(|state| {
            let balance = state.balances.entry(address.to_string()).or_insert(0);
            *balance = balance.saturating_add(sats);
            Ok(*balance)
        })
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of balance queries served (for cache verification).
    pub fn balance_queries(&self) -> u64 {
        self.balance_queries.load(Ordering::SeqCst)
    }

    /// Copy of a will record, for inspection.
    pub fn will(&self, owner: &Identity) -> Option<WillRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.wills.get(owner).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, RegistryError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(RegistryError::RemoteCallFailed("registry unavailable".into()));
        }
        self.state
            .lock()
            .map_err(|_| RegistryError::RemoteCallFailed("registry state poisoned".into()))
    }

    fn now(&self) -> Result<u64, RegistryError> {
        self.clock
            .now()
            .ok_or_else(|| RegistryError::RemoteCallFailed("registry clock unavailable".into()))
    }

    /// Apply `change` to a copy of the state, save it, then swap it in.
    /// A failed save leaves the in-memory state untouched.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut RegistryState) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let value = change(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(value)
    }

    fn persist(&self, state: &RegistryState) -> Result<(), RegistryError> {
        if let Some(ref path) = self.path {
            state.save(path).map_err(|e| {
                log::error!("Failed to save registry to {}: {}", path.display(), e);
                RegistryError::RemoteCallFailed(format!("failed to persist registry: {}", e))
            })?;
        }
        Ok(())
    }
}

impl<C: Clock> Registry for LocalRegistry<C> {
    async fn register_will(
        &self,
        caller: &Identity,
        request: RegisterWill,
    ) -> Result<String, RegistryError> {
        if request.beneficiary_address.trim().is_empty() {
            return Err(RegistryError::InvalidRequest(
                "beneficiary address must not be empty".into(),
            ));
        }
        let now = self.now()?;
        let record = WillRecord::new(
            caller.clone(),
            request.beneficiary,
            request.beneficiary_address.trim(),
            request.heartbeat_interval_secs,
            request.encrypted_payload,
            now,
        )
        .map_err(|e| RegistryError::InvalidRequest(e.to_string()))?;

        let replaced = self.commit(|state| Ok(state.wills.insert(caller.clone(), record).is_some()))?;
        if replaced {
            log::info!("Will re-registered for {}", caller);
        } else {
            log::info!("Will registered for {}", caller);
        }
        Ok("Will registered successfully".to_string())
    }

    async fn broadcast_heartbeat(&self, caller: &Identity) -> Result<(), RegistryError> {
        let now = self.now()?;
        self.commit(|state| {
            let will = state
                .wills
                .get_mut(caller)
                .ok_or_else(|| RegistryError::NoProtocolRegistered(caller.clone()))?;
            will.touch(now);
            Ok(())
        })?;
        log::debug!("Heartbeat from {} at {}", caller, now);
        Ok(())
    }

    async fn get_will_status(&self, caller: &Identity) -> Result<Option<WillStatus>, RegistryError> {
        let state = self.lock()?;
        Ok(state.wills.get(caller).map(WillRecord::status))
    }

    async fn get_pending_claims(
        &self,
        caller: &Identity,
    ) -> Result<Vec<InheritanceClaim>, RegistryError> {
        let now = self.now()?;
        let state = self.lock()?;
        Ok(state
            .wills_for_beneficiary(caller)
            .map(|will| InheritanceClaim::project(will, now))
            .collect())
    }

    async fn get_custody_public_key(&self, caller: &Identity) -> Result<String, RegistryError> {
        let state = self.lock()?;
        Ok(state
            .custody_keys
            .get(caller)
            .cloned()
            .unwrap_or_else(|| self.default_custody_key.clone()))
    }

    async fn get_address_balance(&self, address: &str) -> Result<u64, RegistryError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(RegistryError::InvalidRequest("address must not be empty".into()));
        }
        let state = self.lock()?;
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn submit_claim(
        &self,
        caller: &Identity,
        owner: &Identity,
    ) -> Result<Vec<u8>, RegistryError> {
        let now = self.now()?;
        let state = self.lock()?;
        let will = state.wills.get(owner).ok_or(RegistryError::Unauthorized)?;
        if &will.beneficiary != caller {
            log::warn!("{} tried to claim the will of {}", caller, owner);
            return Err(RegistryError::Unauthorized);
        }
        if !InheritanceClaim::project(will, now).is_expired {
            return Err(RegistryError::OwnerAlive);
        }
        log::info!("Will of {} claimed by {}", owner, caller);
        Ok(will.encrypted_payload.clone().unwrap_or_default())
    }
}
