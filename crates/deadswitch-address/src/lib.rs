//! deadswitch Address
//!
//! Converts the raw secp256k1 public key handed out by the key-management
//! authority into Bitcoin addresses:
//!
//! - Legacy P2PKH (base58check): `1…` on mainnet, `m…`/`n…` on testnet
//! - Native segwit P2WPKH (bech32, witness v0): `bc1q…` / `tb1q…`
//! - Wrapped segwit P2SH-P2WPKH: `3…` / `2…`
//!
//! No private keys, no randomness, no network access.
//!
//! # Example
//!
//! ```ignore
//! use deadswitch_address::{CustodyKey, Network};
//!
//! let custody = CustodyKey::classify(&hex_from_registry)?;
//! let address = custody.resolve(Network::Testnet)?;
//! ```

pub mod codec;
pub mod custody;

pub use codec::{
    derive_address, derive_addresses, verify_address, AddressKind, AddressSet, Network,
};
pub use custody::CustodyKey;

use thiserror::Error;

/// Errors from address derivation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid public key length: {0} bytes. Expected 33 (compressed) or 65 (uncompressed).")]
    InvalidKeyLength(usize),

    #[error("Failed to derive address: {0}")]
    AddressDerivation(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unrecognized custody key: {0}")]
    UnrecognizedKey(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}
