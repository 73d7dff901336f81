use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use reco_core::domain::event::{Event, EventKind, NewEvent};
use reco_core::domain::feedback::{Feedback, PmfScore, ReactionAction};
use reco_core::domain::record::{NewRecord, Record, RecordPage, UserId};

pub mod event;
pub mod feedback;
pub mod memory;
pub mod record;

pub use event::SqlEventRepository;
pub use feedback::SqlFeedbackRepository;
pub use memory::{InMemoryEventRepository, InMemoryFeedbackRepository, InMemoryRecordRepository};
pub use record::SqlRecordRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage of personal records. Keys passed in are already normalized.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Inserts, or overwrites `key_text` and `value` of the existing row for
    /// the same `(owner, key_norm)`. `created_at` of an existing row is kept.
    async fn upsert(&self, record: NewRecord, at: DateTime<Utc>)
        -> Result<Record, RepositoryError>;

    async fn find_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError>;

    /// Updates an existing row only; `None` when there is nothing to edit.
    async fn update_value(
        &self,
        owner: UserId,
        key_norm: &str,
        key_text: &str,
        value: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Record>, RepositoryError>;

    /// Rows whose normalized key contains `needle`, most recent first.
    async fn search_substring(
        &self,
        owner: UserId,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<Record>, RepositoryError>;

    /// Removes and returns the row, if any.
    async fn delete_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError>;

    /// Most recently created first, with the owner's total row count.
    async fn list_page(
        &self,
        owner: UserId,
        offset: u64,
        limit: u32,
    ) -> Result<RecordPage, RepositoryError>;

    async fn count_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError>;

    async fn delete_all_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError>;

    async fn count_all(&self, excluding: Option<UserId>) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append(&self, event: NewEvent) -> Result<(), RepositoryError>;

    async fn last_event_at(
        &self,
        user: UserId,
        kind: EventKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    async fn exists_since(
        &self,
        user: UserId,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Timestamps of every event of `user` at or after `since`.
    async fn activity_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError>;

    async fn events_since(
        &self,
        since: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError>;

    /// Events of one kind in `[since, until)`.
    async fn events_in_range(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn record_feedback(
        &self,
        user: UserId,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn feedback_for_user(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError>;

    async fn record_pmf_answer(
        &self,
        user: UserId,
        score: PmfScore,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn pmf_answered_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn pmf_scores(&self, excluding: Option<UserId>) -> Result<Vec<PmfScore>, RepositoryError>;

    async fn record_quick_reaction(
        &self,
        user: UserId,
        action: ReactionAction,
        useful: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Fixed-width UTC text so that string order equals time order in SQL.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// `excluding` as a bind value; `0` never matches a Telegram user.
pub(crate) fn excluded_id(excluding: Option<UserId>) -> i64 {
    excluding.map(|user| user.0).unwrap_or(0)
}
