use std::sync::Arc;

use chrono::Duration;
use reco_core::clock::SystemClock;
use reco_core::config::{AppConfig, ConfigError, LoadOptions};
use reco_core::session::SessionStore;
use reco_db::{
    connect_with_settings, migrations, DbPool, SqlEventRepository, SqlFeedbackRepository,
    SqlRecordRepository,
};
use reco_telegram::{
    assistant_dispatcher, Assistant, AssistantSettings, PollingRunner, ReconnectPolicy,
    TelegramApi, TransportError,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub sessions: Arc<SessionStore>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telegram client setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let feedback_window =
        std::time::Duration::from_secs(config.engagement.feedback_window_secs);
    let sessions = Arc::new(SessionStore::new(
        config.engagement.ask_every,
        Duration::from_std(feedback_window).unwrap_or_else(|_| Duration::minutes(5)),
    ));

    let assistant = Assistant::new(
        Arc::new(SqlRecordRepository::new(db_pool.clone())),
        Arc::new(SqlEventRepository::new(db_pool.clone())),
        Arc::new(SqlFeedbackRepository::new(db_pool.clone())),
        sessions.clone(),
        Arc::new(SystemClock),
        AssistantSettings::from_config(&config),
    );

    let api = Arc::new(
        TelegramApi::new(
            config.telegram.api_base_url.clone(),
            config.telegram.bot_token.clone(),
            config.telegram.poll_timeout_secs,
        )
        .map_err(BootstrapError::Transport)?,
    );
    let runner = PollingRunner::new(
        api.clone(),
        api,
        assistant_dispatcher(assistant),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.telegram_ready",
        correlation_id = "bootstrap",
        owner_configured = config.telegram.owner_chat_id.is_some(),
        "telegram runner assembled"
    );

    Ok(Application { config, db_pool, sessions, runner })
}
