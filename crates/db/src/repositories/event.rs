use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reco_core::domain::event::{Event, EventKind, NewEvent};
use reco_core::domain::record::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, excluded_id, EventRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlEventRepository {
    pool: DbPool,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &SqliteRow) -> Result<Event, RepositoryError> {
    let kind: String = row.try_get("type").map_err(decode_error)?;
    let meta: Option<String> = row.try_get("meta").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(Event {
        id: row.try_get("id").map_err(decode_error)?,
        user_id: UserId(row.try_get("user_id").map_err(decode_error)?),
        kind: kind.parse().map_err(|error| RepositoryError::Decode(format!("{error}")))?,
        meta: meta
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|error| RepositoryError::Decode(format!("invalid event meta: {error}")))?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl EventRepository for SqlEventRepository {
    async fn append(&self, event: NewEvent) -> Result<(), RepositoryError> {
        let meta = event.meta.as_ref().map(|value| value.to_string());
        sqlx::query("INSERT INTO events (user_id, type, meta, created_at) VALUES (?, ?, ?, ?)")
            .bind(event.user_id.0)
            .bind(event.kind.as_str())
            .bind(meta)
            .bind(encode_timestamp(event.occurred_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_event_at(
        &self,
        user: UserId,
        kind: EventKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM events WHERE user_id = ? AND type = ?",
        )
        .bind(user.0)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        latest.as_deref().map(decode_timestamp).transpose()
    }

    async fn exists_since(
        &self,
        user: UserId,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM events WHERE user_id = ? AND type = ? AND created_at >= ? LIMIT 1",
        )
        .bind(user.0)
        .bind(kind.as_str())
        .bind(encode_timestamp(since))
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn activity_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let stamps: Vec<String> = sqlx::query_scalar(
            "SELECT created_at FROM events WHERE user_id = ? AND created_at >= ? ORDER BY created_at",
        )
        .bind(user.0)
        .bind(encode_timestamp(since))
        .fetch_all(&self.pool)
        .await?;

        stamps.iter().map(|raw| decode_timestamp(raw)).collect()
    }

    async fn events_since(
        &self,
        since: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, type, meta, created_at FROM events
             WHERE created_at >= ? AND user_id != ?
             ORDER BY created_at, id",
        )
        .bind(encode_timestamp(since))
        .bind(excluded_id(excluding))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn events_in_range(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, type, meta, created_at FROM events
             WHERE type = ? AND created_at >= ? AND created_at < ? AND user_id != ?
             ORDER BY created_at, id",
        )
        .bind(kind.as_str())
        .bind(encode_timestamp(since))
        .bind(encode_timestamp(until))
        .bind(excluded_id(excluding))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use reco_core::domain::event::{EventKind, NewEvent};
    use reco_core::domain::record::UserId;

    use super::SqlEventRepository;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::EventRepository;

    async fn repository() -> SqlEventRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlEventRepository::new(pool)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).single().expect("valid time")
    }

    #[tokio::test]
    async fn last_event_and_existence_checks() {
        let repo = repository().await;
        let user = UserId(5);
        assert_eq!(repo.last_event_at(user, EventKind::Save).await.expect("last"), None);

        repo.append(NewEvent::new(user, EventKind::Save, t0())).await.expect("append");
        repo.append(NewEvent::new(user, EventKind::Save, t0() + Duration::hours(3)))
            .await
            .expect("append");
        repo.append(NewEvent::new(user, EventKind::Start, t0() + Duration::hours(5)))
            .await
            .expect("append");

        assert_eq!(
            repo.last_event_at(user, EventKind::Save).await.expect("last"),
            Some(t0() + Duration::hours(3))
        );
        assert!(repo
            .exists_since(user, EventKind::Save, t0() + Duration::hours(3))
            .await
            .expect("exists"));
        assert!(!repo
            .exists_since(user, EventKind::Save, t0() + Duration::hours(4))
            .await
            .expect("exists"));
        assert!(!repo.exists_since(UserId(6), EventKind::Save, t0()).await.expect("exists"));

        let activity = repo.activity_since(user, t0() + Duration::hours(1)).await.expect("activity");
        assert_eq!(activity, vec![t0() + Duration::hours(3), t0() + Duration::hours(5)]);
    }

    #[tokio::test]
    async fn meta_round_trips_and_owner_is_excluded() {
        let repo = repository().await;
        repo.append(
            NewEvent::new(UserId(1), EventKind::Query, t0())
                .with_meta(json!({"key_norm": "wifi", "results": 2})),
        )
        .await
        .expect("append");
        repo.append(NewEvent::new(UserId(99), EventKind::Query, t0())).await.expect("append");
        repo.append(NewEvent::new(UserId(1), EventKind::Save, t0() + Duration::days(8)))
            .await
            .expect("append");

        let all = repo.events_since(t0(), None).await.expect("events");
        assert_eq!(all.len(), 3);

        let without_owner = repo.events_since(t0(), Some(UserId(99))).await.expect("events");
        assert_eq!(without_owner.len(), 2);
        assert_eq!(without_owner[0].key_norm(), Some("wifi"));

        let week = repo
            .events_in_range(EventKind::Query, t0(), t0() + Duration::days(7), Some(UserId(99)))
            .await
            .expect("range");
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].meta, Some(json!({"key_norm": "wifi", "results": 2})));

        let empty = repo
            .events_in_range(EventKind::Save, t0(), t0() + Duration::days(7), None)
            .await
            .expect("range");
        assert!(empty.is_empty());
    }
}
