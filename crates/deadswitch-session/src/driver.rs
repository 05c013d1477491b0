//! Async executor for controller actions.
//!
//! [`SessionDriver`] runs [`SessionAction`]s against a [`Registry`] and a
//! [`Cache`], and reports each outcome as a [`SessionEvent`]. Actions are
//! either spawned onto the tokio runtime ([`SessionDriver::dispatch`]) with
//! results delivered on the event channel, or executed inline and applied
//! straight away ([`SessionDriver::settle`]).

use crate::cache::{balance_key, Cache, CacheEntry};
use crate::controller::{LoginSnapshot, SessionController, SessionError, View};
use crate::events::{SessionAction, SessionEvent};
use crate::panels::{AddressDisplay, BalanceReading};
use crate::refresh::RefreshTicket;
use deadswitch_address::{CustodyKey, Network};
use deadswitch_core::{Clock, Identity};
use deadswitch_registry::{Registry, RegistryError};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub network: Network,
    /// Cached balances younger than this are served without a remote call.
    pub balance_ttl_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            balance_ttl_secs: 300,
        }
    }
}

pub struct SessionDriver<R, C, K> {
    registry: Arc<R>,
    cache: Arc<C>,
    clock: Arc<K>,
    config: DriverConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<R, C, K> Clone for SessionDriver<R, C, K> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            clock: Arc::clone(&self.clock),
            config: self.config,
            events: self.events.clone(),
        }
    }
}

impl<R, C, K> SessionDriver<R, C, K>
where
    R: Registry + 'static,
    C: Cache + 'static,
    K: Clock + 'static,
{
    /// Create a driver and the receiving end of its event channel.
    pub fn new(
        registry: Arc<R>,
        cache: Arc<C>,
        clock: Arc<K>,
        config: DriverConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                cache,
                clock,
                config,
                events,
            },
            receiver,
        )
    }

    pub fn now(&self) -> Option<u64> {
        self.clock.now()
    }

    /// Fetch the caller's will status and claims, then authenticate.
    pub async fn login(
        &self,
        controller: &mut SessionController,
        identity: Identity,
    ) -> Result<View, SessionError> {
        let (will, claims) = tokio::join!(
            self.registry.get_will_status(&identity),
            self.registry.get_pending_claims(&identity),
        );
        controller.authenticate(identity, LoginSnapshot { will, claims }, self.now())
    }

    /// Spawn each action. Results arrive on the event channel.
    pub fn dispatch(&self, actions: Vec<SessionAction>) {
        for action in actions {
            let driver = self.clone();
            tokio::spawn(async move {
                let events = driver.events.clone();
                driver.execute(action, &events).await;
            });
        }
    }

    /// Execute actions inline, applying every result and any follow-up work
    /// it produces, until nothing is left.
    pub async fn settle(&self, controller: &mut SessionController, actions: Vec<SessionAction>) {
        let (events, mut receiver) = mpsc::unbounded_channel();
        let mut pending: VecDeque<SessionAction> = actions.into();
        while let Some(action) = pending.pop_front() {
            self.execute(action, &events).await;
            while let Ok(event) = receiver.try_recv() {
                pending.extend(controller.apply(event, self.now()));
            }
        }
    }

    /// Drive `controller` until `shutdown` completes: one tick per second,
    /// results applied as they arrive. `observe` runs after every update.
    pub async fn run<F>(
        &self,
        controller: &mut SessionController,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        shutdown: F,
        mut observe: impl FnMut(&mut SessionController),
    ) where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let actions = controller.tick(self.now());
                    self.dispatch(actions);
                }
                Some(event) = events.recv() => {
                    let actions = controller.apply(event, self.now());
                    self.dispatch(actions);
                }
                _ = &mut shutdown => {
                    info!("Session loop stopping");
                    break;
                }
            }
            observe(controller);
        }
    }

    /// Execute one action, sending its result(s) to `events`.
    pub async fn execute(&self, action: SessionAction, events: &mpsc::UnboundedSender<SessionEvent>) {
        match action {
            SessionAction::RefreshAddress {
                ticket,
                caller,
                force,
            } => {
                let result = self.resolve_address(&caller, force).await;
                emit(events, SessionEvent::AddressLoaded { ticket, result });
            }
            SessionAction::RefreshBalance {
                ticket,
                address,
                force,
            } => {
                self.refresh_balance(ticket, address, force, events).await;
            }
            SessionAction::RefreshWillStatus { ticket, caller } => {
                let result = self.registry.get_will_status(&caller).await;
                emit(events, SessionEvent::WillStatusLoaded { ticket, result });
            }
            SessionAction::RefreshClaims { ticket, caller } => {
                let result = self.registry.get_pending_claims(&caller).await;
                emit(events, SessionEvent::ClaimsLoaded { ticket, result });
            }
            SessionAction::BroadcastHeartbeat { epoch, caller } => {
                let result = self.registry.broadcast_heartbeat(&caller).await;
                emit(events, SessionEvent::HeartbeatCompleted { epoch, result });
            }
            SessionAction::RegisterWill {
                epoch,
                caller,
                request,
            } => {
                let result = self.registry.register_will(&caller, request).await;
                emit(events, SessionEvent::WillRegistered { epoch, result });
            }
            SessionAction::SubmitClaim {
                epoch,
                caller,
                owner,
            } => {
                let result = self.registry.submit_claim(&caller, &owner).await;
                emit(
                    events,
                    SessionEvent::ClaimCompleted {
                        epoch,
                        owner,
                        result,
                    },
                );
            }
        }
    }

    /// Custody key → display address. The key is always fetched; the
    /// derived address comes from the cache unless forced.
    ///
    /// Conversion failures are part of the display, not an error: the raw
    /// key is still shown.
    async fn resolve_address(
        &self,
        caller: &Identity,
        force: bool,
    ) -> Result<AddressDisplay, RegistryError> {
        let network = self.config.network;
        let raw = self.registry.get_custody_public_key(caller).await?;

        let custody = match CustodyKey::classify(&raw) {
            Ok(custody) => custody,
            Err(e) => return Ok(AddressDisplay::unconverted(raw, e.to_string())),
        };

        let address_key = custody.cache_key(network);
        if !force {
            if let Some(hit) = self.cache_get(&address_key) {
                debug!("Address for {} served from cache", caller);
                return Ok(AddressDisplay::resolved(raw, hit.value));
            }
        }

        match custody.resolve(network) {
            Ok(address) => {
                self.cache_set(&address_key, &address, self.now().unwrap_or(0));
                Ok(AddressDisplay::resolved(raw, address))
            }
            Err(e) => Ok(AddressDisplay::unconverted(raw, e.to_string())),
        }
    }

    /// Serve a fresh cached balance, or post the stale one and re-fetch.
    async fn refresh_balance(
        &self,
        ticket: RefreshTicket,
        address: String,
        force: bool,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let key = balance_key(&address);

        if !force {
            if let Some(entry) = self.cache_get(&key) {
                match entry.value.parse::<u64>() {
                    Ok(sats) => {
                        let fresh = self
                            .now()
                            .is_some_and(|now| entry.is_fresh(self.config.balance_ttl_secs, now));
                        emit(
                            events,
                            SessionEvent::BalanceLoaded {
                                ticket,
                                address: address.clone(),
                                result: Ok(BalanceReading {
                                    sats,
                                    fetched_at: Some(entry.fetched_at),
                                    stale: !fresh,
                                }),
                            },
                        );
                        if fresh {
                            return;
                        }
                    }
                    Err(e) => warn!("Ignoring unreadable cached balance for {}: {}", address, e),
                }
            }
        }

        let result = self
            .registry
            .get_address_balance(&address)
            .await
            .map(|sats| {
                let fetched_at = self.now();
                if let Some(at) = fetched_at {
                    self.cache_set(&key, &sats.to_string(), at);
                }
                BalanceReading {
                    sats,
                    fetched_at,
                    stale: false,
                }
            });
        emit(events, SessionEvent::BalanceLoaded {
            ticket,
            address,
            result,
        });
    }

    fn cache_get(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn cache_set(&self, key: &str, value: &str, fetched_at: u64) {
        if let Err(e) = self.cache.set(key, value, fetched_at) {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        debug!("Event receiver dropped");
    }
}
