//! The `monitor` loop. Ticks the session once per second and logs what changes.

use crate::commands::Client;
use crate::config::ServerConfig;
use anyhow::Result;
use deadswitch_session::{NoticeLevel, SessionController, View};

/// Run the monitor until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("deadswitch monitor starting…");
    log::info!("  Network:    {}", config.bitcoin.network);
    log::info!("  Identity:   {}", config.identity.principal);
    log::info!("  Data dir:   {}", config.server.data_dir.display());
    log::info!("  Balance TTL: {} seconds", config.session.balance_ttl_secs);

    let mut client = Client::open(&config)?;
    let view = client.login().await?;
    log::info!("Logged in as {} ({})", client.identity, view);

    let Client {
        driver,
        mut events,
        mut controller,
        ..
    } = client;

    let mut observer = Observer::new(&controller);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received shutdown signal. Exiting…");
    };

    driver
        .run(&mut controller, &mut events, shutdown, |c| observer.observe(c))
        .await;

    controller.logout();
    Ok(())
}

/// Turns controller state into log lines without repeating itself.
struct Observer {
    view: View,
    minute: Option<i64>,
}

impl Observer {
    fn new(controller: &SessionController) -> Self {
        Self {
            view: controller.view(),
            minute: None,
        }
    }

    fn observe(&mut self, controller: &mut SessionController) {
        for notice in controller.take_notices() {
            match notice.level {
                NoticeLevel::Info => log::info!("{}", notice.message),
                NoticeLevel::Warning => log::warn!("{}", notice.message),
                NoticeLevel::Error => log::error!("{}", notice.message),
            }
        }

        if controller.view() != self.view {
            log::info!("View: {} -> {}", self.view, controller.view());
            if controller.view() == View::CriticalAlert {
                log::warn!("⚠️  Critical condition: {}", controller.countdown());
                if let Some(claims) = controller.claims().last_known() {
                    for claim in claims.iter().filter(|c| c.is_expired) {
                        log::warn!("  Will of {} is claimable", claim.owner);
                    }
                }
            }
            self.view = controller.view();
        }

        let minute = controller.liveness().remaining_secs().div_euclid(60);
        if self.minute != Some(minute) {
            log::info!("{}", controller.countdown());
            self.minute = Some(minute);
        }
    }
}
