//! deadswitch Session
//!
//! Client-side session logic: which view is shown, what the monitor panels
//! contain, and when remote data is fetched.
//!
//! # Architecture
//!
//! ```text
//!   user intent / tick ──▶ SessionController ──▶ SessionAction
//!                               ▲                      │
//!                               │                      ▼
//!                          SessionEvent ◀──── SessionDriver ──▶ Registry
//!                                                      │
//!                                                      └──────▶ Cache
//! ```
//!
//! [`SessionController`] is synchronous and deterministic. [`SessionDriver`]
//! owns the I/O and runs on tokio.

pub mod cache;
pub mod controller;
pub mod driver;
pub mod events;
pub mod panels;
pub mod refresh;

pub use cache::{Cache, CacheEntry, CacheError, MemoryCache, SqliteCache};
pub use controller::{
    EdgeDetector, LoginSnapshot, Notice, NoticeLevel, SessionConfig, SessionController,
    SessionError, View, WillDraft, SECS_PER_DAY,
};
pub use driver::{DriverConfig, SessionDriver};
pub use events::{SessionAction, SessionEvent};
pub use panels::{AddressDisplay, BalanceReading, DataState};
pub use refresh::{RefreshKind, RefreshTicket};
