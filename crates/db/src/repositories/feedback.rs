use chrono::{DateTime, Utc};
use sqlx::Row;

use reco_core::domain::feedback::{Feedback, PmfScore, ReactionAction};
use reco_core::domain::record::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, excluded_id, FeedbackRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn record_feedback(
        &self,
        user: UserId,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO feedback (user_id, text, created_at) VALUES (?, ?, ?)")
            .bind(user.0)
            .bind(text)
            .bind(encode_timestamp(at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn feedback_for_user(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, text, created_at FROM feedback WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let created_at: String = row.try_get("created_at").map_err(decode_error)?;
                Ok(Feedback {
                    user_id: UserId(row.try_get("user_id").map_err(decode_error)?),
                    text: row.try_get("text").map_err(decode_error)?,
                    created_at: decode_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    async fn record_pmf_answer(
        &self,
        user: UserId,
        score: PmfScore,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO pmf_answers (user_id, score, created_at) VALUES (?, ?, ?)")
            .bind(user.0)
            .bind(i64::from(score.value()))
            .bind(encode_timestamp(at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pmf_answered_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM pmf_answers WHERE user_id = ? AND created_at >= ? LIMIT 1",
        )
        .bind(user.0)
        .bind(encode_timestamp(since))
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn pmf_scores(&self, excluding: Option<UserId>) -> Result<Vec<PmfScore>, RepositoryError> {
        let raw: Vec<i64> =
            sqlx::query_scalar("SELECT score FROM pmf_answers WHERE user_id != ? ORDER BY id")
                .bind(excluded_id(excluding))
                .fetch_all(&self.pool)
                .await?;

        raw.into_iter()
            .map(|score| {
                u8::try_from(score)
                    .ok()
                    .and_then(|value| PmfScore::new(value).ok())
                    .ok_or_else(|| RepositoryError::Decode(format!("invalid pmf score {score}")))
            })
            .collect()
    }

    async fn record_quick_reaction(
        &self,
        user: UserId,
        action: ReactionAction,
        useful: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quick_reactions (user_id, action, useful, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user.0)
        .bind(action.as_str())
        .bind(i64::from(useful))
        .bind(encode_timestamp(at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use reco_core::domain::feedback::{PmfScore, ReactionAction};
    use reco_core::domain::record::UserId;

    use super::SqlFeedbackRepository;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::FeedbackRepository;
    use crate::DbPool;

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        pool
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).single().expect("valid time")
    }

    #[tokio::test]
    async fn feedback_is_kept_in_order() {
        let repo = SqlFeedbackRepository::new(pool().await);
        repo.record_feedback(UserId(3), "the search", t0()).await.expect("feedback");
        repo.record_feedback(UserId(3), "lists", t0() + Duration::minutes(1)).await.expect("feedback");
        repo.record_feedback(UserId(4), "other", t0()).await.expect("feedback");

        let texts = repo
            .feedback_for_user(UserId(3))
            .await
            .expect("load")
            .into_iter()
            .map(|feedback| feedback.text)
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["the search", "lists"]);
    }

    #[tokio::test]
    async fn pmf_answers_respect_window_and_exclusion() {
        let repo = SqlFeedbackRepository::new(pool().await);
        let score = |value| PmfScore::new(value).expect("valid score");
        repo.record_pmf_answer(UserId(3), score(5), t0()).await.expect("answer");
        repo.record_pmf_answer(UserId(8), score(2), t0()).await.expect("answer");

        assert!(repo.pmf_answered_since(UserId(3), t0()).await.expect("since"));
        assert!(!repo
            .pmf_answered_since(UserId(3), t0() + Duration::seconds(1))
            .await
            .expect("since"));
        assert_eq!(repo.pmf_scores(None).await.expect("scores"), vec![score(5), score(2)]);
        assert_eq!(repo.pmf_scores(Some(UserId(8))).await.expect("scores"), vec![score(5)]);
    }

    #[tokio::test]
    async fn quick_reactions_are_stored() {
        let db = pool().await;
        let repo = SqlFeedbackRepository::new(db.clone());
        repo.record_quick_reaction(UserId(3), ReactionAction::Query, false, t0())
            .await
            .expect("reaction");

        let (action, useful): (String, i64) =
            sqlx::query_as("SELECT action, useful FROM quick_reactions")
                .fetch_one(&db)
                .await
                .expect("row");
        assert_eq!(action, "query");
        assert_eq!(useful, 0);
    }
}
