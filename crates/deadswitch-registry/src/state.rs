//! Persistent state for the local registry

use deadswitch_core::{Identity, WillRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from state operations
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the local registry knows
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryState {
    /// Wills by owner
    #[serde(default)]
    pub wills: BTreeMap<Identity, WillRecord>,
    /// Per-owner custody key overrides
    #[serde(default)]
    pub custody_keys: BTreeMap<Identity, String>,
    /// Confirmed balances by address (satoshis)
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
}

impl RegistryState {
    /// Load state from file, or create empty if not exists
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let state: RegistryState = serde_json::from_str(&contents)?;
            Ok(state)
        } else {
            Ok(Self::default())
        }
    }

    /// Save state to file
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Wills naming `beneficiary`
    pub fn wills_for_beneficiary<'a>(
        &'a self,
        beneficiary: &'a Identity,
    ) -> impl Iterator<Item = &'a WillRecord> + 'a {
        self.wills
            .values()
            .filter(move |will| &will.beneficiary == beneficiary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = RegistryState::load(&dir.path().join("nope.json")).unwrap();
        assert!(state.wills.is_empty());
        assert!(state.balances.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("registry.json");

        let mut state = RegistryState::default();
        let will = WillRecord::new(id("alice"), id("bob"), "tb1qbob", 300, vec![7], 1000).unwrap();
        state.wills.insert(id("alice"), will.clone());
        state.balances.insert("tb1qvault".into(), 50_000);
        state.save(&path).unwrap();

        let loaded = RegistryState::load(&path).unwrap();
        assert_eq!(loaded.wills.get(&id("alice")), Some(&will));
        assert_eq!(loaded.balances.get("tb1qvault"), Some(&50_000));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RegistryState::load(&path), Err(StateError::Json(_))));
    }

    #[test]
    fn test_wills_for_beneficiary() {
        let mut state = RegistryState::default();
        for (owner, heir) in [("a", "bob"), ("b", "carol"), ("c", "bob")] {
            let will = WillRecord::new(id(owner), id(heir), "tb1q", 300, vec![], 0).unwrap();
            state.wills.insert(id(owner), will);
        }
        let bob = id("bob");
        let owners: Vec<&str> = state
            .wills_for_beneficiary(&bob)
            .map(|w| w.owner.as_str())
            .collect();
        assert_eq!(owners, vec!["a", "c"]);
    }
}
