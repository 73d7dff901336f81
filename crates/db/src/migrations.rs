use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(
        event_name = "db.migrations.applied",
        latest_version = latest_version().unwrap_or_default(),
        "database migrations are up to date"
    );
    Ok(())
}

pub fn latest_version() -> Option<i64> {
    MIGRATOR.iter().map(|migration| migration.version).max()
}

/// Versions recorded as applied in `_sqlx_migrations`.
pub async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
    )
    .fetch_all(pool)
    .await
}
