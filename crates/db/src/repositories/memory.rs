use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use reco_core::domain::event::{Event, EventKind, NewEvent};
use reco_core::domain::feedback::{Feedback, PmfScore, QuickReaction, ReactionAction};
use reco_core::domain::record::{NewRecord, Record, RecordPage, UserId};

use super::{EventRepository, FeedbackRepository, RecordRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<HashMap<(UserId, String), Record>>,
    next_id: AtomicI64,
}

impl InMemoryRecordRepository {
    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn newest_first(records: &mut [Record]) {
    records.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| right.id.cmp(&left.id))
    });
}

#[async_trait::async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn upsert(
        &self,
        record: NewRecord,
        at: DateTime<Utc>,
    ) -> Result<Record, RepositoryError> {
        let mut records = self.records.write().await;
        let slot = (record.owner_id, record.key_norm.clone());
        let stored = match records.get(&slot) {
            Some(existing) => Record {
                key_text: record.key_text,
                value: record.value,
                ..existing.clone()
            },
            None => Record {
                id: self.allocate_id(),
                owner_id: record.owner_id,
                key_norm: record.key_norm,
                key_text: record.key_text,
                value: record.value,
                created_at: at,
            },
        };
        records.insert(slot, stored.clone());
        Ok(stored)
    }

    async fn find_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&(owner, key_norm.to_owned())).cloned())
    }

    async fn update_value(
        &self,
        owner: UserId,
        key_norm: &str,
        key_text: &str,
        value: &str,
        _at: DateTime<Utc>,
    ) -> Result<Option<Record>, RepositoryError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&(owner, key_norm.to_owned())).map(|record| {
            record.key_text = key_text.to_owned();
            record.value = value.to_owned();
            record.clone()
        }))
    }

    async fn search_substring(
        &self,
        owner: UserId,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<Record>, RepositoryError> {
        let records = self.records.read().await;
        let mut hits = records
            .values()
            .filter(|record| record.owner_id == owner && record.key_norm.contains(needle))
            .cloned()
            .collect::<Vec<_>>();
        newest_first(&mut hits);
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn delete_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError> {
        let mut records = self.records.write().await;
        Ok(records.remove(&(owner, key_norm.to_owned())))
    }

    async fn list_page(
        &self,
        owner: UserId,
        offset: u64,
        limit: u32,
    ) -> Result<RecordPage, RepositoryError> {
        let records = self.records.read().await;
        let mut owned =
            records.values().filter(|record| record.owner_id == owner).cloned().collect::<Vec<_>>();
        newest_first(&mut owned);
        let total = owned.len() as u64;
        let records = owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect();
        Ok(RecordPage { records, total })
    }

    async fn count_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.keys().filter(|(user, _)| *user == owner).count() as u64)
    }

    async fn delete_all_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|(user, _), _| *user != owner);
        Ok((before - records.len()) as u64)
    }

    async fn count_all(&self, excluding: Option<UserId>) -> Result<u64, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.keys().filter(|(user, _)| Some(*user) != excluding).count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventRepository {
    /// Copy of the whole log, oldest first.
    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    pub async fn count_of(&self, user: UserId, kind: EventKind) -> usize {
        let events = self.events.read().await;
        events.iter().filter(|event| event.user_id == user && event.kind == kind).count()
    }
}

#[async_trait::async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn append(&self, event: NewEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        let id = events.len() as i64 + 1;
        events.push(Event {
            id,
            user_id: event.user_id,
            kind: event.kind,
            meta: event.meta,
            created_at: event.occurred_at,
        });
        Ok(())
    }

    async fn last_event_at(
        &self,
        user: UserId,
        kind: EventKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.user_id == user && event.kind == kind)
            .map(|event| event.created_at)
            .max())
    }

    async fn exists_since(
        &self,
        user: UserId,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .any(|event| event.user_id == user && event.kind == kind && event.created_at >= since))
    }

    async fn activity_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let events = self.events.read().await;
        let mut stamps = events
            .iter()
            .filter(|event| event.user_id == user && event.created_at >= since)
            .map(|event| event.created_at)
            .collect::<Vec<_>>();
        stamps.sort();
        Ok(stamps)
    }

    async fn events_since(
        &self,
        since: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError> {
        let events = self.events.read().await;
        let mut selected = events
            .iter()
            .filter(|event| event.created_at >= since && Some(event.user_id) != excluding)
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|event| (event.created_at, event.id));
        Ok(selected)
    }

    async fn events_in_range(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        excluding: Option<UserId>,
    ) -> Result<Vec<Event>, RepositoryError> {
        let events = self.events.read().await;
        let mut selected = events
            .iter()
            .filter(|event| {
                event.kind == kind
                    && event.created_at >= since
                    && event.created_at < until
                    && Some(event.user_id) != excluding
            })
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|event| (event.created_at, event.id));
        Ok(selected)
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    feedback: RwLock<Vec<Feedback>>,
    pmf_answers: RwLock<Vec<(UserId, PmfScore, DateTime<Utc>)>>,
    reactions: RwLock<Vec<QuickReaction>>,
}

impl InMemoryFeedbackRepository {
    pub async fn reactions(&self) -> Vec<QuickReaction> {
        self.reactions.read().await.clone()
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn record_feedback(
        &self,
        user: UserId,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.feedback.write().await.push(Feedback {
            user_id: user,
            text: text.to_owned(),
            created_at: at,
        });
        Ok(())
    }

    async fn feedback_for_user(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError> {
        let feedback = self.feedback.read().await;
        Ok(feedback.iter().filter(|entry| entry.user_id == user).cloned().collect())
    }

    async fn record_pmf_answer(
        &self,
        user: UserId,
        score: PmfScore,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.pmf_answers.write().await.push((user, score, at));
        Ok(())
    }

    async fn pmf_answered_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let answers = self.pmf_answers.read().await;
        Ok(answers.iter().any(|(who, _, at)| *who == user && *at >= since))
    }

    async fn pmf_scores(&self, excluding: Option<UserId>) -> Result<Vec<PmfScore>, RepositoryError> {
        let answers = self.pmf_answers.read().await;
        Ok(answers
            .iter()
            .filter(|(who, _, _)| Some(*who) != excluding)
            .map(|(_, score, _)| *score)
            .collect())
    }

    async fn record_quick_reaction(
        &self,
        user: UserId,
        action: ReactionAction,
        useful: bool,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.reactions.write().await.push(QuickReaction {
            user_id: user,
            action,
            useful,
            created_at: at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use reco_core::domain::event::{EventKind, NewEvent};
    use reco_core::domain::feedback::PmfScore;
    use reco_core::domain::record::{NewRecord, UserId};

    use crate::repositories::{
        EventRepository, FeedbackRepository, InMemoryEventRepository, InMemoryFeedbackRepository,
        InMemoryRecordRepository, RecordRepository,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).single().expect("valid time")
    }

    #[tokio::test]
    async fn in_memory_records_behave_like_sql() {
        let repo = InMemoryRecordRepository::default();
        let first = repo
            .upsert(NewRecord::new(UserId(1), "Tel Mamá", "612").expect("record"), t0())
            .await
            .expect("insert");
        let again = repo
            .upsert(
                NewRecord::new(UserId(1), "tel mama", "699").expect("record"),
                t0() + Duration::hours(1),
            )
            .await
            .expect("upsert");
        repo.upsert(
            NewRecord::new(UserId(1), "wifi", "pass").expect("record"),
            t0() + Duration::minutes(5),
        )
        .await
        .expect("insert");

        assert_eq!(again.id, first.id);
        assert_eq!(again.created_at, t0());
        assert_eq!(again.value, "699");

        let page = repo.list_page(UserId(1), 0, 50).await.expect("page");
        assert_eq!(page.total, 2);
        assert_eq!(page.records[0].key_norm, "wifi");

        let hits = repo.search_substring(UserId(1), "mama", 50).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert!(repo.search_substring(UserId(2), "mama", 50).await.expect("search").is_empty());

        assert_eq!(repo.count_all(Some(UserId(1))).await.expect("count"), 0);
        assert_eq!(repo.delete_all_for_owner(UserId(1)).await.expect("wipe"), 2);
    }

    #[tokio::test]
    async fn in_memory_events_and_answers() {
        let events = InMemoryEventRepository::default();
        events.append(NewEvent::new(UserId(1), EventKind::Start, t0())).await.expect("append");
        events
            .append(NewEvent::new(UserId(1), EventKind::Start, t0() + Duration::hours(2)))
            .await
            .expect("append");

        assert_eq!(
            events.last_event_at(UserId(1), EventKind::Start).await.expect("last"),
            Some(t0() + Duration::hours(2))
        );
        assert_eq!(events.count_of(UserId(1), EventKind::Start).await, 2);
        assert!(events.events_since(t0(), Some(UserId(1))).await.expect("events").is_empty());

        let answers = InMemoryFeedbackRepository::default();
        answers
            .record_pmf_answer(UserId(1), PmfScore::new(4).expect("score"), t0())
            .await
            .expect("answer");
        assert!(answers.pmf_answered_since(UserId(1), t0() - Duration::days(90)).await.expect("since"));
        assert!(!answers.pmf_answered_since(UserId(2), t0()).await.expect("since"));
    }
}
