use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Save,
    Query,
    Edit,
    Delete,
    List,
    Unrecognized,
    WipePrompt,
    WipeAll,
    Nudge1,
    Nudge2,
    Nudge3,
}

impl EventKind {
    /// Command kinds counted when computing the unrecognized-format rate.
    pub const TRACKED_COMMANDS: [EventKind; 6] =
        [Self::Save, Self::Query, Self::Edit, Self::Delete, Self::List, Self::Unrecognized];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Save => "save",
            Self::Query => "query",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Unrecognized => "unrecognized",
            Self::WipePrompt => "wipe_prompt",
            Self::WipeAll => "wipe_all",
            Self::Nudge1 => "nudge1",
            Self::Nudge2 => "nudge2",
            Self::Nudge3 => "nudge3",
        }
    }
}

impl FromStr for EventKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start" => Ok(Self::Start),
            "save" => Ok(Self::Save),
            "query" => Ok(Self::Query),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "unrecognized" => Ok(Self::Unrecognized),
            "wipe_prompt" => Ok(Self::WipePrompt),
            "wipe_all" => Ok(Self::WipeAll),
            "nudge1" => Ok(Self::Nudge1),
            "nudge2" => Ok(Self::Nudge2),
            "nudge3" => Ok(Self::Nudge3),
            other => Err(DomainError::UnknownEventKind(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub user_id: UserId,
    pub kind: EventKind,
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// `meta.key_norm` for save/query/edit/delete events.
    pub fn key_norm(&self) -> Option<&str> {
        self.meta.as_ref()?.get("key_norm")?.as_str().filter(|key| !key.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub user_id: UserId,
    pub kind: EventKind,
    pub meta: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(user_id: UserId, kind: EventKind, occurred_at: DateTime<Utc>) -> Self {
        Self { user_id, kind, meta: None, occurred_at }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}
