//! Public key → address encodings.

use crate::AddressError;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, AddressType, CompressedPublicKey, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compressed SEC1 point length.
pub const COMPRESSED_KEY_LEN: usize = 33;
/// Uncompressed SEC1 point length.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Target network for address encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "testnet3" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Every address form generable from one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSet {
    /// P2PKH
    pub legacy: String,
    /// P2WPKH
    pub segwit: String,
    /// P2SH-P2WPKH, absent if it could not be generated
    pub wrapped_segwit: Option<String>,
}

/// Encoding of a parsed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Legacy,
    Segwit,
    /// Script hash; for our keys this is the wrapped segwit form.
    ScriptHash,
    Other,
}

fn parse_key(key: &[u8]) -> Result<PublicKey, AddressError> {
    if key.len() != COMPRESSED_KEY_LEN && key.len() != UNCOMPRESSED_KEY_LEN {
        return Err(AddressError::InvalidKeyLength(key.len()));
    }
    PublicKey::from_slice(key).map_err(|e| AddressError::AddressDerivation(e.to_string()))
}

fn legacy(pk: &PublicKey, network: Network) -> String {
    Address::p2pkh(pk.pubkey_hash(), network.to_bitcoin()).to_string()
}

fn compressed(pk: &PublicKey) -> Result<CompressedPublicKey, AddressError> {
    CompressedPublicKey::try_from(*pk).map_err(|_| {
        AddressError::AddressDerivation("segwit requires a compressed public key".into())
    })
}

fn segwit(pk: &PublicKey, network: Network) -> Result<String, AddressError> {
    let ck = compressed(pk)?;
    Ok(Address::p2wpkh(&ck, network.to_bitcoin()).to_string())
}

fn wrapped_segwit(pk: &PublicKey, network: Network) -> Result<String, AddressError> {
    let ck = compressed(pk)?;
    Ok(Address::p2shwpkh(&ck, network.to_bitcoin()).to_string())
}

/// Derive the preferred address for a raw public key.
///
/// Returns native segwit when possible and falls back to legacy only when
/// segwit generation fails (uncompressed keys).
pub fn derive_address(key: &[u8], network: Network) -> Result<String, AddressError> {
    let pk = parse_key(key)?;
    match segwit(&pk, network) {
        Ok(address) => Ok(address),
        Err(e) => {
            log::debug!("Segwit derivation failed ({}); falling back to legacy", e);
            Ok(legacy(&pk, network))
        }
    }
}

/// Derive all address forms for a raw public key.
///
/// Legacy and segwit are required; the wrapped form is optional.
pub fn derive_addresses(key: &[u8], network: Network) -> Result<AddressSet, AddressError> {
    let pk = parse_key(key)?;
    let legacy = legacy(&pk, network);
    let segwit = segwit(&pk, network)?;
    let wrapped_segwit = match wrapped_segwit(&pk, network) {
        Ok(address) => Some(address),
        Err(e) => {
            log::warn!("Wrapped segwit derivation failed: {}", e);
            None
        }
    };
    Ok(AddressSet {
        legacy,
        segwit,
        wrapped_segwit,
    })
}

/// Parse an address and check its checksum and network.
pub fn verify_address(address: &str, network: Network) -> Result<AddressKind, AddressError> {
    let unchecked = Address::<NetworkUnchecked>::from_str(address.trim())
        .map_err(|e| AddressError::InvalidAddress(e.to_string()))?;
    let checked = unchecked
        .require_network(network.to_bitcoin())
        .map_err(|e| AddressError::InvalidAddress(e.to_string()))?;
    Ok(match checked.address_type() {
        Some(AddressType::P2pkh) => AddressKind::Legacy,
        Some(AddressType::P2wpkh) => AddressKind::Segwit,
        Some(AddressType::P2sh) => AddressKind::ScriptHash,
        _ => AddressKind::Other,
    })
}
