use async_trait::async_trait;

use reco_core::render::{chunk_text, CHUNK_CHARS};

use crate::api::TransportError;
use crate::keyboards::InlineKeyboard;

/// Something a handler wants done on the chat side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundAction {
    SendMessage {
        chat_id: i64,
        text: String,
        html: bool,
        keyboard: Option<InlineKeyboard>,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
    EditMessage {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
}

impl OutboundAction {
    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self::SendMessage { chat_id, text: text.into(), html: true, keyboard: None }
    }

    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self::SendMessage { chat_id, text: text.into(), html: false, keyboard: None }
    }

    pub fn answer(callback_id: impl Into<String>, text: Option<String>) -> Self {
        Self::AnswerCallback { callback_id: callback_id.into(), text }
    }

    /// Attaches a keyboard; other variants are returned unchanged.
    pub fn with_keyboard(self, keyboard: InlineKeyboard) -> Self {
        match self {
            Self::SendMessage { chat_id, text, html, .. } => {
                Self::SendMessage { chat_id, text, html, keyboard: Some(keyboard) }
            }
            other => other,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::SendMessage { text, .. } | Self::EditMessage { text, .. } => Some(text),
            Self::AnswerCallback { text, .. } => text.as_deref(),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "sendMessage",
            Self::AnswerCallback { .. } => "answerCallbackQuery",
            Self::EditMessage { .. } => "editMessageText",
        }
    }
}

/// Splits a long HTML reply into messages that fit Telegram's size limit.
pub fn html_chunks(chat_id: i64, text: &str) -> Vec<OutboundAction> {
    chunk_text(text, CHUNK_CHARS).into_iter().map(|chunk| OutboundAction::html(chat_id, chunk)).collect()
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, action: &OutboundAction) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopReplySink;

#[async_trait]
impl ReplySink for NoopReplySink {
    async fn deliver(&self, _action: &OutboundAction) -> Result<(), TransportError> {
        Ok(())
    }
}
