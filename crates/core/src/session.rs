//! Process-local conversational state: the "was this useful?" throttle and
//! the free-text feedback window opened after a survey answer. Nothing here
//! is persisted; a restart starts from empty maps.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::feedback::ReactionAction;
use crate::domain::record::UserId;

#[derive(Debug)]
pub struct SessionStore {
    ask_every: u32,
    feedback_window: Duration,
    usage_counters: RwLock<HashMap<(UserId, ReactionAction), u32>>,
    awaiting_feedback: RwLock<HashMap<UserId, DateTime<Utc>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(3, Duration::minutes(5))
    }
}

impl SessionStore {
    pub fn new(ask_every: u32, feedback_window: Duration) -> Self {
        Self {
            ask_every: ask_every.max(1),
            feedback_window,
            usage_counters: RwLock::new(HashMap::new()),
            awaiting_feedback: RwLock::new(HashMap::new()),
        }
    }

    /// Counts one use of `action` and reports whether this use should get a
    /// usefulness prompt (every `ask_every`-th use per user and action).
    pub async fn should_ask(&self, user_id: UserId, action: ReactionAction) -> bool {
        let mut counters = self.usage_counters.write().await;
        let count = counters.entry((user_id, action)).or_insert(0);
        *count = count.saturating_add(1);
        *count % self.ask_every == 0
    }

    pub async fn open_feedback_window(&self, user_id: UserId, now: DateTime<Utc>) {
        self.awaiting_feedback.write().await.insert(user_id, now + self.feedback_window);
    }

    /// Expired windows are dropped on read.
    pub async fn is_awaiting_feedback(&self, user_id: UserId, now: DateTime<Utc>) -> bool {
        let expires_at = self.awaiting_feedback.read().await.get(&user_id).copied();
        match expires_at {
            Some(expires_at) if now <= expires_at => true,
            Some(_) => {
                self.awaiting_feedback.write().await.remove(&user_id);
                false
            }
            None => false,
        }
    }

    pub async fn clear_feedback_window(&self, user_id: UserId) {
        self.awaiting_feedback.write().await.remove(&user_id);
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.awaiting_feedback.write().await;
        let before = windows.len();
        windows.retain(|_, expires_at| now <= *expires_at);
        before - windows.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::SessionStore;
    use crate::domain::feedback::ReactionAction;
    use crate::domain::record::UserId;

    #[tokio::test]
    async fn usefulness_prompt_fires_every_third_use_per_action() {
        let store = SessionStore::new(3, Duration::minutes(5));
        let user = UserId(1);

        let saves = [
            store.should_ask(user, ReactionAction::Save).await,
            store.should_ask(user, ReactionAction::Save).await,
            store.should_ask(user, ReactionAction::Query).await,
            store.should_ask(user, ReactionAction::Save).await,
        ];
        assert_eq!(saves, [false, false, false, true]);
        assert!(!store.should_ask(UserId(2), ReactionAction::Save).await);
    }

    #[tokio::test]
    async fn feedback_window_expires() {
        let store = SessionStore::new(3, Duration::minutes(5));
        let user = UserId(9);
        let opened = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).single().expect("valid time");

        assert!(!store.is_awaiting_feedback(user, opened).await);
        store.open_feedback_window(user, opened).await;
        assert!(store.is_awaiting_feedback(user, opened + Duration::minutes(4)).await);
        assert!(!store.is_awaiting_feedback(user, opened + Duration::minutes(6)).await);
        assert!(!store.is_awaiting_feedback(user, opened).await);
    }

    #[tokio::test]
    async fn clear_and_sweep_remove_windows() {
        let store = SessionStore::default();
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).single().expect("valid time");

        store.open_feedback_window(UserId(1), now).await;
        store.open_feedback_window(UserId(2), now - Duration::hours(1)).await;
        store.clear_feedback_window(UserId(1)).await;
        assert!(!store.is_awaiting_feedback(UserId(1), now).await);

        assert_eq!(store.sweep_expired(now).await, 1);
    }
}
