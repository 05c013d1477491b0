//! One-shot client commands.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use deadswitch_core::{
    format_countdown, HeartbeatAction, Identity, InheritanceClaim, Liveness, SystemClock,
    WillStatus,
};
use deadswitch_registry::LocalRegistry;
use deadswitch_session::{
    DataState, NoticeLevel, SessionAction, SessionController, SessionDriver, SessionEvent,
    SqliteCache, View, WillDraft,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type HostRegistry = LocalRegistry<SystemClock>;
pub type HostDriver = SessionDriver<HostRegistry, SqliteCache, SystemClock>;

/// Registry, cache and session opened from the configuration.
pub struct Client {
    pub identity: Identity,
    pub registry: Arc<HostRegistry>,
    pub driver: HostDriver,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub controller: SessionController,
}

impl Client {
    pub fn open(config: &ServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
            format!(
                "Failed to create data dir: {}",
                config.server.data_dir.display()
            )
        })?;

        let state_path = config.state_path();
        let registry = LocalRegistry::open(
            &state_path,
            SystemClock,
            config.registry.custody_key.trim(),
        )
        .with_context(|| format!("Failed to open registry at {}", state_path.display()))?;
        let registry = Arc::new(registry);

        let cache_path = config.cache_path();
        let cache = SqliteCache::open(&cache_path)
            .with_context(|| format!("Failed to open cache at {}", cache_path.display()))?;

        let (driver, events) = SessionDriver::new(
            Arc::clone(&registry),
            Arc::new(cache),
            Arc::new(SystemClock),
            config.driver_config()?,
        );

        Ok(Self {
            identity: config.identity()?,
            registry,
            driver,
            events,
            controller: SessionController::new(config.session_config()?),
        })
    }

    pub async fn login(&mut self) -> Result<View> {
        self.driver
            .login(&mut self.controller, self.identity.clone())
            .await
            .context("Login failed")
    }

    pub fn now(&self) -> Option<u64> {
        self.driver.now()
    }

    /// Run actions to completion and print the resulting notices.
    /// Fails if any of them reports an error.
    pub async fn settle(&mut self, actions: Vec<SessionAction>) -> Result<()> {
        self.driver.settle(&mut self.controller, actions).await;

        let mut failure = None;
        for notice in self.controller.take_notices() {
            match notice.level {
                NoticeLevel::Info => println!("✅ {}", notice.message),
                NoticeLevel::Warning => eprintln!("⚠️  {}", notice.message),
                NoticeLevel::Error => {
                    eprintln!("❌ {}", notice.message);
                    failure = Some(notice.message);
                }
            }
        }
        match failure {
            Some(message) => anyhow::bail!(message),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Serialize)]
struct StatusReport<'a> {
    identity: &'a str,
    view: View,
    liveness: Liveness,
    remaining_secs: i64,
    will: Option<WillStatus>,
    claims: &'a [InheritanceClaim],
}

pub async fn status(config: &ServerConfig, json: bool) -> Result<()> {
    let mut client = Client::open(config)?;
    let view = client.login().await?;
    let c = &client.controller;

    if json {
        let report = StatusReport {
            identity: client.identity.as_str(),
            view,
            liveness: c.liveness(),
            remaining_secs: c.liveness().remaining_secs(),
            will: c.will_status().value().copied().flatten(),
            claims: c.claims().value().map(Vec::as_slice).unwrap_or(&[]),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Identity:   {}", client.identity);
    println!("View:       {}", view);
    println!("Liveness:   {}", c.countdown());

    match c.will_status() {
        DataState::Ready(Some(status)) => {
            println!(
                "Interval:   {}",
                format_countdown(status.heartbeat_interval_secs)
            );
            println!("Last alive: {}", status.last_active);
            println!("Deadline:   {}", status.deadline());
        }
        DataState::Ready(None) => println!("Will:       none registered"),
        other => {
            if let Some(e) = other.error() {
                println!("Will:       unavailable ({})", e);
            }
        }
    }

    if let Some(advice) = client.now().and_then(|now| c.heartbeat_advice(now)) {
        let hint = match advice.action {
            HeartbeatAction::Healthy => "healthy",
            HeartbeatAction::CheckinRecommended => "heartbeat recommended",
            HeartbeatAction::CheckinRequired => "heartbeat required now",
            HeartbeatAction::Expired => "expired",
        };
        println!(
            "Advice:     {} ({:.0}% elapsed)",
            hint,
            advice.elapsed_fraction * 100.0
        );
    }

    match c.claims().last_known() {
        Some(claims) => println!("Claims:     {}", claims.len()),
        None => println!("Claims:     unavailable"),
    }
    Ok(())
}

pub async fn heartbeat(config: &ServerConfig) -> Result<()> {
    let mut client = Client::open(config)?;
    client.login().await?;
    let actions = client
        .controller
        .request_heartbeat()
        .context("Cannot send heartbeat")?;
    client.settle(actions).await?;
    println!("Liveness:   {}", client.controller.countdown());
    Ok(())
}

pub async fn register(
    config: &ServerConfig,
    beneficiary: &str,
    address: &str,
    days: Option<u64>,
    will: Vec<u8>,
) -> Result<()> {
    let mut client = Client::open(config)?;
    client.login().await?;

    let days = days.unwrap_or(config.session.heartbeat_days);
    let draft = WillDraft::with_days(beneficiary, address, days, will);
    let actions = client
        .controller
        .request_register(draft)
        .context("Cannot register will")?;
    client.settle(actions).await?;
    println!("Liveness:   {}", client.controller.countdown());
    Ok(())
}

pub async fn claims(config: &ServerConfig) -> Result<()> {
    let mut client = Client::open(config)?;
    client.login().await?;

    if let Some(e) = client.controller.claims().error() {
        anyhow::bail!("Claims unavailable: {}", e);
    }
    let now = client.now().context("System clock unavailable")?;
    let ranked = client.controller.ranked_claims(now);
    if ranked.is_empty() {
        println!("No wills name {} as beneficiary.", client.identity);
        return Ok(());
    }
    for (claim, status) in ranked {
        let state = if claim.is_expired {
            "EXPIRED, claimable".to_string()
        } else {
            format!("alive, {}", format_countdown(claim.remaining_at(now)))
        };
        println!(
            "{:<24} {:<12} {:>4.0}%  {}",
            claim.owner,
            state,
            status.elapsed_fraction * 100.0,
            claim.beneficiary_address
        );
    }
    Ok(())
}

pub async fn claim(config: &ServerConfig, owner: &str) -> Result<()> {
    let owner = Identity::new(owner).context("Invalid owner identity")?;
    let mut client = Client::open(config)?;
    client.login().await?;

    let actions = client
        .controller
        .request_claim(&owner)
        .with_context(|| format!("Cannot claim the will of {}", owner))?;
    client.settle(actions).await?;

    match client.controller.unlocked_secret(&owner) {
        Some([]) => println!("(the will carries no digital payload)"),
        Some(secret) => println!("{}", String::from_utf8_lossy(secret)),
        None => anyhow::bail!("Claim did not release a secret"),
    }
    Ok(())
}

pub async fn address(config: &ServerConfig, force: bool) -> Result<()> {
    let mut client = Client::open(config)?;
    client.login().await?;

    let now = client.now();
    let actions = if force {
        client.controller.force_refresh_address(now)?
    } else {
        client.controller.navigate(View::Monitor, now)?
    };
    client.settle(actions).await?;

    let c = &client.controller;
    match c.address() {
        DataState::Ready(display) => {
            println!("Custody key: {}", display.raw);
            match (&display.address, &display.conversion_error) {
                (Some(address), _) => println!("Address:     {}", address),
                (None, Some(e)) => println!("Address:     conversion failed ({})", e),
                (None, None) => println!("Address:     unknown"),
            }
        }
        other => {
            let reason = other.error().unwrap_or("not loaded");
            anyhow::bail!("Custody address unavailable: {}", reason);
        }
    }

    match c.balance() {
        DataState::Ready(reading) => println!(
            "Balance:     {} sats{}",
            reading.sats,
            if reading.stale { " (stale)" } else { "" }
        ),
        DataState::Failed { message, last } => match last {
            Some(reading) => println!(
                "Balance:     {} sats (refresh failed: {})",
                reading.sats, message
            ),
            None => println!("Balance:     unavailable ({})", message),
        },
        DataState::NotLoaded => {}
    }
    Ok(())
}

pub fn credit(config: &ServerConfig, address: &str, sats: u64) -> Result<()> {
    let client = Client::open(config)?;
    let total = client
        .registry
        .credit(address, sats)
        .with_context(|| format!("Failed to credit {}", address))?;
    println!("Balance of {}: {} sats", address, total);
    Ok(())
}
