use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::text::{normalize_key, to_plain_spaces};

/// Telegram user id. Private chats share the same id, so it doubles as the
/// reply target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub owner_id: UserId,
    pub key_norm: String,
    pub key_text: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Write model for an upsert. `key_norm` is always derived from `key_text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRecord {
    pub owner_id: UserId,
    pub key_norm: String,
    pub key_text: String,
    pub value: String,
}

impl NewRecord {
    pub fn new(
        owner_id: UserId,
        raw_key: &str,
        raw_value: &str,
    ) -> Result<Self, DomainError> {
        let key_text = to_plain_spaces(raw_key);
        let key_norm = normalize_key(&key_text);
        if key_norm.is_empty() {
            return Err(DomainError::EmptyKey);
        }
        let value = to_plain_spaces(raw_value);
        if value.is_empty() {
            return Err(DomainError::EmptyValue { key: key_text });
        }
        Ok(Self { owner_id, key_norm, key_text, value })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: u64,
}
