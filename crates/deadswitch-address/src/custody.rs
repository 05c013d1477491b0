//! Classification of the custody key string returned by the registry.
//!
//! Depending on deployment the registry hands back either a hex-encoded raw
//! public key or an address that was already encoded upstream. The string is
//! classified once here; everything downstream matches on [`CustodyKey`].

use crate::codec::{derive_address, Network};
use crate::AddressError;
use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustodyKey {
    /// Raw SEC1 public key bytes (length not yet validated).
    RawKey(Vec<u8>),
    /// A recognised mainnet or testnet address, kept verbatim.
    Address(String),
}

impl CustodyKey {
    /// Classify an untyped custody key string.
    pub fn classify(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::UnrecognizedKey("empty".into()));
        }

        if let Ok(address) = Address::<NetworkUnchecked>::from_str(trimmed) {
            if address.is_valid_for_network(bitcoin::Network::Bitcoin)
                || address.is_valid_for_network(bitcoin::Network::Testnet)
            {
                return Ok(CustodyKey::Address(trimmed.to_string()));
            }
        }

        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        match hex::decode(hex_str) {
            Ok(bytes) => Ok(CustodyKey::RawKey(bytes)),
            Err(e) => Err(AddressError::UnrecognizedKey(format!("{}: {}", trimmed, e))),
        }
    }

    /// The address to display and query: pass-through or derived.
    pub fn resolve(&self, network: Network) -> Result<String, AddressError> {
        match self {
            CustodyKey::Address(address) => Ok(address.clone()),
            CustodyKey::RawKey(bytes) => derive_address(bytes, network),
        }
    }

    /// Cache key for the resolved address. Includes key and network.
    pub fn cache_key(&self, network: Network) -> String {
        match self {
            CustodyKey::Address(address) => format!("address:{}:{}", address, network),
            CustodyKey::RawKey(bytes) => format!("address:{}:{}", hex::encode(bytes), network),
        }
    }

    pub fn is_raw_key(&self) -> bool {
        matches!(self, CustodyKey::RawKey(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_raw_key_classified_and_derived() {
        let custody = CustodyKey::classify(G_COMPRESSED).unwrap();
        assert!(custody.is_raw_key());
        assert_eq!(
            custody.resolve(Network::Testnet).unwrap(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
    }

    #[test]
    fn test_addresses_pass_through_unchanged() {
        for address in [
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
        ] {
            let custody = CustodyKey::classify(address).unwrap();
            assert_eq!(custody, CustodyKey::Address(address.to_string()));
            // Network selector is irrelevant for pass-through
            assert_eq!(custody.resolve(Network::Testnet).unwrap(), address);
            assert_eq!(custody.resolve(Network::Mainnet).unwrap(), address);
        }
    }

    #[test]
    fn test_wrong_length_hex_reaches_codec() {
        let custody = CustodyKey::classify(&"ab".repeat(64)).unwrap();
        assert_eq!(
            custody.resolve(Network::Testnet),
            Err(AddressError::InvalidKeyLength(64))
        );
    }

    #[test]
    fn test_garbage_is_unrecognized() {
        assert!(matches!(
            CustodyKey::classify("not a key"),
            Err(AddressError::UnrecognizedKey(_))
        ));
        assert!(matches!(
            CustodyKey::classify("   "),
            Err(AddressError::UnrecognizedKey(_))
        ));
    }

    #[test]
    fn test_cache_key_includes_network() {
        let custody = CustodyKey::classify(G_COMPRESSED).unwrap();
        let main = custody.cache_key(Network::Mainnet);
        let test = custody.cache_key(Network::Testnet);
        assert_ne!(main, test);
        assert!(main.starts_with("address:0279be66"));
        assert!(test.ends_with(":testnet"));
    }

    #[test]
    fn test_hex_prefix_accepted() {
        let custody = CustodyKey::classify(&format!("0x{}", G_COMPRESSED)).unwrap();
        assert!(custody.is_raw_key());
    }
}
