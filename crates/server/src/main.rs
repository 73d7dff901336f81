mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use reco_core::config::{AppConfig, LoadOptions};
use reco_core::session::SessionStore;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use reco_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let transport_mode = if app.runner.is_noop_transport() { "noop" } else { "polling" };

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.db_pool.clone(), transport_mode),
    )
    .await?;
    spawn_session_sweeper(app.sessions.clone());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode,
        "reco-server started"
    );

    let outcome = tokio::select! {
        polled = app.runner.start() => polled.map_err(anyhow::Error::from),
        signal = wait_for_shutdown() => signal,
    };

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "reco-server stopping"
    );
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.pool_close_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "database pool did not close within the grace period"
        );
    }

    outcome
}

/// Drops expired feedback windows so idle users do not accumulate.
fn spawn_session_sweeper(sessions: Arc<SessionStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep_expired(Utc::now()).await;
            if removed > 0 {
                tracing::debug!(
                    event_name = "system.sessions.swept",
                    removed,
                    "expired feedback windows removed"
                );
            }
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
