use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::record::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Answer to "how disappointed would you be without the bot", 1 to 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PmfScore(u8);

impl PmfScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidPmfScore(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// 4 and 5 count as users who would be very disappointed.
    pub fn is_strong(&self) -> bool {
        self.0 >= 4
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    Save,
    Query,
    Edit,
    Delete,
}

impl ReactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Query => "query",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for ReactionAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "save" => Ok(Self::Save),
            "query" => Ok(Self::Query),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            other => Err(DomainError::UnknownReactionAction(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReaction {
    pub user_id: UserId,
    pub action: ReactionAction,
    pub useful: bool,
    pub created_at: DateTime<Utc>,
}
