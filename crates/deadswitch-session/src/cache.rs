//! Local key-value cache for derived addresses and balances.
//!
//! Only used to avoid redundant remote calls; never a source of truth.
//! Every entry records when it was fetched so callers can apply a TTL.
//!
//! Keys:
//! - `address:<key>:<network>` — derived address (no TTL)
//! - `balance:<address>` — confirmed satoshis (TTL applies)

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// A cached value and its fetch time (seconds since epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub fetched_at: u64,
}

impl CacheEntry {
    /// Whether the entry is younger than `ttl_secs` at `now`.
    pub fn is_fresh(&self, ttl_secs: u64, now: u64) -> bool {
        now.saturating_sub(self.fetched_at) < ttl_secs
    }
}

pub fn balance_key(address: &str) -> String {
    format!("balance:{}", address)
}

/// Injectable cache backend.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    fn set(&self, key: &str, value: &str, fetched_at: u64) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, fetched_at: u64) -> Result<(), CacheError> {
        (**self).set(key, value, fetched_at)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove(key)
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, fetched_at: u64) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                fetched_at,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed cache that survives restarts.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Cache held in an in-memory SQLite database.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Cache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let mut stmt = conn.prepare_cached("SELECT value, fetched_at FROM cache WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => {
                let fetched_at: i64 = row.get(1)?;
                Ok(Some(CacheEntry {
                    value: row.get(0)?,
                    fetched_at: u64::try_from(fetched_at).unwrap_or(0),
                }))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, fetched_at: u64) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            "INSERT INTO cache (key, value, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, fetched_at = excluded.fetched_at",
            params![key, value, i64::try_from(fetched_at).unwrap_or(i64::MAX)],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(())
    }
}
