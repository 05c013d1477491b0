//! deadswitch Registry
//!
//! The remote operations the client consumes, expressed as the [`Registry`]
//! trait, plus [`LocalRegistry`], a file-backed implementation of the same
//! server-side rules for single-host deployments and tests.
//!
//! Every call names the authenticated caller. Expiration is computed
//! registry-side with the shared liveness clock, so a claim is only released
//! once the owner's heartbeat interval has fully elapsed.

pub mod local;
pub mod state;

pub use local::LocalRegistry;
pub use state::{RegistryState, StateError};

use deadswitch_core::{Identity, InheritanceClaim, WillStatus};
use std::future::Future;
use thiserror::Error;

/// Errors from registry calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No will found for {0}")]
    NoProtocolRegistered(Identity),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Owner is still alive")]
    OwnerAlive,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),
}

/// Arguments of a will registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWill {
    pub beneficiary: Identity,
    pub beneficiary_address: String,
    pub heartbeat_interval_secs: u64,
    /// Sealed payload produced by the encryption service. May be empty.
    pub encrypted_payload: Vec<u8>,
}

/// Remote will registry.
///
/// Heartbeats and claims are not idempotent-safe; implementations and callers
/// must not retry them silently.
pub trait Registry: Send + Sync {
    /// Register (or re-register) the caller's will. Returns a confirmation.
    fn register_will(
        &self,
        caller: &Identity,
        request: RegisterWill,
    ) -> impl Future<Output = Result<String, RegistryError>> + Send;

    /// Proof of life. Fails if the caller has no will.
    fn broadcast_heartbeat(
        &self,
        caller: &Identity,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Timing of the caller's own will, `None` if not registered.
    fn get_will_status(
        &self,
        caller: &Identity,
    ) -> impl Future<Output = Result<Option<WillStatus>, RegistryError>> + Send;

    /// Wills naming the caller as beneficiary.
    fn get_pending_claims(
        &self,
        caller: &Identity,
    ) -> impl Future<Output = Result<Vec<InheritanceClaim>, RegistryError>> + Send;

    /// Custody key for the caller: hex public key or an already-encoded address.
    fn get_custody_public_key(
        &self,
        caller: &Identity,
    ) -> impl Future<Output = Result<String, RegistryError>> + Send;

    /// Confirmed balance of an address in satoshis.
    fn get_address_balance(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<u64, RegistryError>> + Send;

    /// Claim an expired will. Returns the sealed payload.
    fn submit_claim(
        &self,
        caller: &Identity,
        owner: &Identity,
    ) -> impl Future<Output = Result<Vec<u8>, RegistryError>> + Send;
}
