//! Client configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use deadswitch_address::{CustodyKey, Network};
use deadswitch_core::Identity;
use deadswitch_session::{DriverConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General settings
    #[serde(default)]
    pub server: ServerSection,

    /// Bitcoin network settings
    #[serde(default)]
    pub bitcoin: BitcoinSection,

    /// Who this host acts as
    #[serde(default)]
    pub identity: IdentitySection,

    /// Local registry settings
    #[serde(default)]
    pub registry: RegistrySection,

    /// Session behaviour
    #[serde(default)]
    pub session: SessionSection,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (registry state, cache database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Bitcoin network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinSection {
    /// Bitcoin network: "bitcoin"/"mainnet" or "testnet"
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for BitcoinSection {
    fn default() -> Self {
        Self {
            network: default_network(),
        }
    }
}

/// Authenticated caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySection {
    /// Principal this host logs in as
    #[serde(default)]
    pub principal: String,
}

/// Local registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Registry state file, relative to `data_dir` unless absolute
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Cache database, relative to `data_dir` unless absolute
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Custody key handed to every owner: hex public key or an address
    #[serde(default)]
    pub custody_key: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            cache_file: default_cache_file(),
            custody_key: String::new(),
        }
    }
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Balance freshness window in seconds (default: 5 minutes)
    #[serde(default = "default_balance_ttl")]
    pub balance_ttl_secs: u64,

    /// Accept registrations without a digital will
    #[serde(default = "default_allow_empty_payload")]
    pub allow_empty_payload: bool,

    /// Default heartbeat interval for `register`, in days
    #[serde(default = "default_heartbeat_days")]
    pub heartbeat_days: u64,

    /// How often the monitor re-fetches claims (0 disables)
    #[serde(default = "default_claims_poll")]
    pub claims_poll_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            balance_ttl_secs: default_balance_ttl(),
            allow_empty_payload: default_allow_empty_payload(),
            heartbeat_days: default_heartbeat_days(),
            claims_poll_secs: default_claims_poll(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("registry.json")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("cache.db")
}

fn default_balance_ttl() -> u64 {
    300 // 5 minutes
}

fn default_allow_empty_payload() -> bool {
    true
}

fn default_heartbeat_days() -> u64 {
    90
}

fn default_claims_poll() -> u64 {
    60
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `DEADSWITCH_DATA_DIR`
    /// - `DEADSWITCH_LOG_LEVEL`
    /// - `DEADSWITCH_NETWORK`
    /// - `DEADSWITCH_IDENTITY`
    /// - `DEADSWITCH_CUSTODY_KEY`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DEADSWITCH_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEADSWITCH_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("DEADSWITCH_NETWORK") {
            self.bitcoin.network = v;
        }
        if let Ok(v) = std::env::var("DEADSWITCH_IDENTITY") {
            self.identity.principal = v;
        }
        if let Ok(v) = std::env::var("DEADSWITCH_CUSTODY_KEY") {
            self.registry.custody_key = v;
        }
    }

    pub fn network(&self) -> Result<Network> {
        self.bitcoin
            .network
            .parse()
            .with_context(|| format!("Unsupported network: {}", self.bitcoin.network))
    }

    pub fn identity(&self) -> Result<Identity> {
        Identity::new(self.identity.principal.as_str()).context("identity.principal is invalid")
    }

    pub fn state_path(&self) -> PathBuf {
        self.server.data_dir.join(&self.registry.state_file)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.server.data_dir.join(&self.registry.cache_file)
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            network: self.network()?,
            allow_empty_payload: self.session.allow_empty_payload,
            balance_ttl_secs: self.session.balance_ttl_secs,
            claims_poll_secs: self.session.claims_poll_secs,
            ..SessionConfig::default()
        })
    }

    pub fn driver_config(&self) -> Result<DriverConfig> {
        Ok(DriverConfig {
            network: self.network()?,
            balance_ttl_secs: self.session.balance_ttl_secs,
        })
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.network()?;

        anyhow::ensure!(
            !self.identity.principal.trim().is_empty(),
            "identity.principal must not be empty"
        );

        anyhow::ensure!(
            !self.registry.custody_key.trim().is_empty(),
            "registry.custody_key must not be empty"
        );
        CustodyKey::classify(&self.registry.custody_key)
            .context("registry.custody_key is neither a hex public key nor an address")?;

        anyhow::ensure!(
            self.session.balance_ttl_secs > 0,
            "session.balance_ttl_secs must be > 0"
        );

        anyhow::ensure!(
            self.session.heartbeat_days > 0,
            "session.heartbeat_days must be > 0"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
