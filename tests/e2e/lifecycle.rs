//! End-to-end lifecycle: an owner registers a will and checks in, goes
//! silent, and the beneficiary is alerted and claims.
//!
//! Runs the real driver against a [`LocalRegistry`] on a manual clock, so
//! expiry is reached instantly.

use deadswitch_core::{Identity, Liveness, ManualClock};
use deadswitch_registry::LocalRegistry;
use deadswitch_session::{
    Cache, DriverConfig, MemoryCache, NoticeLevel, SessionConfig, SessionController,
    SessionDriver, SessionError, SqliteCache, View, WillDraft,
};
use std::sync::Arc;

const CUSTODY_KEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const CUSTODY_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
const HEIR_ADDRESS: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";
const T0: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

fn id(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

fn session() -> SessionController {
    SessionController::new(SessionConfig::default())
}

fn driver<C: Cache + 'static>(
    registry: Arc<LocalRegistry<ManualClock>>,
    cache: C,
    clock: &ManualClock,
) -> SessionDriver<LocalRegistry<ManualClock>, C, ManualClock> {
    let (driver, _events) = SessionDriver::new(
        registry,
        Arc::new(cache),
        Arc::new(clock.clone()),
        DriverConfig::default(),
    );
    driver
}

#[tokio::test]
async fn test_full_inheritance_lifecycle() {
    let clock = ManualClock::at(T0);
    let registry = Arc::new(LocalRegistry::in_memory(clock.clone(), CUSTODY_KEY));
    let driver = driver(registry, MemoryCache::new(), &clock);

    // Owner with no will yet
    let mut alice = session();
    let view = driver.login(&mut alice, id("alice")).await.unwrap();
    assert_eq!(view, View::ProtocolSetup);
    assert_eq!(alice.liveness(), Liveness::NoProtocol);
    assert_eq!(alice.countdown(), "NO PROTOCOL INITIALIZED");
    assert_eq!(
        alice.request_heartbeat().unwrap_err(),
        SessionError::NoProtocolRegistered
    );

    // Register
    let draft = WillDraft::with_days("bob", HEIR_ADDRESS, 1, b"seed words".to_vec());
    let actions = alice.request_register(draft).unwrap();
    driver.settle(&mut alice, actions).await;
    let notices = alice.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Will registered successfully");
    assert_eq!(alice.countdown(), "ALIVE (001:00:00:00)");

    // Beneficiary sees a live will it cannot claim yet
    let mut bob = session();
    let view = driver.login(&mut bob, id("bob")).await.unwrap();
    assert_eq!(view, View::ProtocolSetup);
    assert_eq!(bob.claims().value().map(Vec::len), Some(1));
    assert_eq!(
        bob.request_claim(&id("alice")).unwrap_err(),
        SessionError::ClaimNotExpired(id("alice"))
    );

    // Half a day later the owner checks in, restarting the interval
    clock.advance(DAY / 2);
    let actions = alice.request_heartbeat().unwrap();
    driver.settle(&mut alice, actions).await;
    let notices = alice.take_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Info && n.message == "Heartbeat sent"));
    alice.tick(driver.now());
    assert_eq!(alice.countdown(), "ALIVE (001:00:00:00)");

    // The owner goes silent for a full interval
    clock.advance(DAY);
    let actions = alice.tick(driver.now());
    driver.settle(&mut alice, actions).await;
    assert_eq!(alice.countdown(), "PROTOCOL ACTIVATED");
    assert_eq!(alice.view(), View::CriticalAlert);

    // The beneficiary's claims poll picks up the expiry and raises the alert
    let actions = bob.tick(driver.now());
    assert!(!actions.is_empty());
    driver.settle(&mut bob, actions).await;
    assert_eq!(bob.view(), View::CriticalAlert);
    assert!(bob.is_critical());

    let actions = bob.request_claim(&id("alice")).unwrap();
    driver.settle(&mut bob, actions).await;
    assert_eq!(bob.unlocked_secret(&id("alice")), Some(&b"seed words"[..]));

    // A late heartbeat restarts the clock but leaves the alert view in place
    let actions = alice.request_heartbeat().unwrap();
    driver.settle(&mut alice, actions).await;
    alice.tick(driver.now());
    assert_eq!(alice.countdown(), "ALIVE (001:00:00:00)");
    assert_eq!(alice.view(), View::CriticalAlert);
}

#[tokio::test]
async fn test_manual_navigation_suppresses_auto_alert() {
    let clock = ManualClock::at(T0);
    let registry = Arc::new(LocalRegistry::in_memory(clock.clone(), CUSTODY_KEY));
    let driver = driver(registry, MemoryCache::new(), &clock);

    let mut alice = session();
    driver.login(&mut alice, id("alice")).await.unwrap();
    let draft = WillDraft::with_days("bob", HEIR_ADDRESS, 1, Vec::new());
    let actions = alice.request_register(draft).unwrap();
    driver.settle(&mut alice, actions).await;

    let actions = alice.navigate(View::Monitor, driver.now()).unwrap();
    driver.settle(&mut alice, actions).await;
    let actions = alice.close(driver.now()).unwrap();
    driver.settle(&mut alice, actions).await;
    assert_eq!(alice.view(), View::ProtocolSetup);

    clock.advance(DAY);
    let actions = alice.tick(driver.now());
    driver.settle(&mut alice, actions).await;
    assert!(alice.is_critical());
    assert_eq!(alice.view(), View::ProtocolSetup);
}

#[tokio::test]
async fn test_persisted_registry_and_cache_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("registry.json");
    let cache_path = dir.path().join("cache.db");
    let clock = ManualClock::at(T0);

    // First run: register, fund, view the monitor
    {
        let registry = Arc::new(
            LocalRegistry::open(&state_path, clock.clone(), CUSTODY_KEY).unwrap(),
        );
        registry.credit(CUSTODY_ADDRESS, 50_000).unwrap();
        let cache = SqliteCache::open(&cache_path).unwrap();
        let driver = driver(Arc::clone(&registry), cache, &clock);

        let mut alice = session();
        driver.login(&mut alice, id("alice")).await.unwrap();
        let draft = WillDraft::with_days("bob", HEIR_ADDRESS, 30, b"vault".to_vec());
        let actions = alice.request_register(draft).unwrap();
        driver.settle(&mut alice, actions).await;

        let actions = alice.navigate(View::Monitor, driver.now()).unwrap();
        driver.settle(&mut alice, actions).await;
        let display = alice.address().value().unwrap();
        assert_eq!(display.address.as_deref(), Some(CUSTODY_ADDRESS));
        assert_eq!(alice.balance().value().unwrap().sats, 50_000);
        assert_eq!(registry.balance_queries(), 1);
    }

    // Second run a minute later: will reloaded, balance served from cache
    clock.advance(60);
    let registry =
        Arc::new(LocalRegistry::open(&state_path, clock.clone(), CUSTODY_KEY).unwrap());
    let cache = SqliteCache::open(&cache_path).unwrap();
    let driver = driver(Arc::clone(&registry), cache, &clock);

    let mut alice = session();
    driver.login(&mut alice, id("alice")).await.unwrap();
    assert!(alice.liveness().has_protocol());
    assert_eq!(alice.countdown(), "ALIVE (029:23:59:00)");

    let actions = alice.navigate(View::Monitor, driver.now()).unwrap();
    driver.settle(&mut alice, actions).await;
    let reading = alice.balance().value().unwrap();
    assert_eq!(reading.sats, 50_000);
    assert!(!reading.stale);
    assert_eq!(registry.balance_queries(), 0);
}

#[tokio::test]
async fn test_results_after_logout_are_dropped() {
    let clock = ManualClock::at(T0);
    let registry = Arc::new(LocalRegistry::in_memory(clock.clone(), CUSTODY_KEY));
    let (driver, mut events) = SessionDriver::new(
        registry,
        Arc::new(MemoryCache::new()),
        Arc::new(clock.clone()),
        DriverConfig::default(),
    );

    let mut alice = session();
    driver.login(&mut alice, id("alice")).await.unwrap();
    let actions = alice.navigate(View::Monitor, driver.now()).unwrap();
    driver.dispatch(actions);
    alice.logout();

    let event = events.recv().await.unwrap();
    assert!(alice.apply(event, driver.now()).is_empty());
    assert_eq!(alice.view(), View::Unauthenticated);
    assert!(alice.address().value().is_none());

    // A fresh session starts clean
    driver.login(&mut alice, id("alice")).await.unwrap();
    assert_eq!(alice.view(), View::ProtocolSetup);
}
