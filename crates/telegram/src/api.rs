//! Thin Bot API client. Only the methods the bot uses are modeled.

use std::time::Duration;

use async_trait::async_trait;
use reco_core::text::strip_html;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::polling::UpdateSource;
use crate::reply::{OutboundAction, ReplySink};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("bot api rejected `{method}`: {description}")]
    Api { method: String, description: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl TelegramApi {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        // The HTTP timeout must outlive the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token,
            poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<T, TransportError> {
        debug!(event_name = "egress.telegram.request", method, "calling bot api");
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|error| TransportError::Send(error.without_url().to_string()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(error.without_url().to_string()))?;

        match body {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                method: method.to_owned(),
                description: description.unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }

    /// Username of the bot; doubles as a token check.
    pub async fn get_me(&self) -> Result<Option<String>, TransportError> {
        let me: User = self.call("getMe", &json!({})).await?;
        Ok(me.username)
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let mut payload = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", &payload).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        html: bool,
        keyboard: Option<&crate::keyboards::InlineKeyboard>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if html {
            payload["parse_mode"] = json!("HTML");
        }
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = json!(keyboard);
        }
        let _: Value = self.call("sendMessage", &payload).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: Value = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TransportError> {
        let payload = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        let _: Value = self.call("editMessageText", &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramApi {
    async fn connect(&self) -> Result<(), TransportError> {
        let username = self
            .get_me()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        debug!(
            event_name = "ingress.telegram.connected",
            bot_username = username.as_deref().unwrap_or("unknown"),
            "bot api reachable"
        );
        Ok(())
    }

    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        self.get_updates(offset).await.map(Some)
    }
}

#[async_trait]
impl ReplySink for TelegramApi {
    async fn deliver(&self, action: &OutboundAction) -> Result<(), TransportError> {
        match action {
            OutboundAction::SendMessage { chat_id, text, html: true, keyboard } => {
                match self.send_message(*chat_id, text, true, keyboard.as_ref()).await {
                    Err(TransportError::Api { description, .. }) => {
                        warn!(
                            event_name = "egress.telegram.html_rejected",
                            chat_id,
                            error = %description,
                            "html send rejected, retrying as plain text"
                        );
                        self.send_message(*chat_id, &strip_html(text), false, keyboard.as_ref())
                            .await
                    }
                    other => other,
                }
            }
            OutboundAction::SendMessage { chat_id, text, html: false, keyboard } => {
                self.send_message(*chat_id, text, false, keyboard.as_ref()).await
            }
            OutboundAction::AnswerCallback { callback_id, text } => {
                self.answer_callback_query(callback_id, text.as_deref()).await
            }
            OutboundAction::EditMessage { chat_id, message_id, text } => {
                self.edit_message_text(*chat_id, *message_id, text).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{ApiResponse, TelegramApi, Update};

    #[test]
    fn method_urls_embed_the_token_once() {
        let api = TelegramApi::new(
            "https://api.telegram.org/",
            SecretString::from("123:abc".to_owned()),
            30,
        )
        .expect("client");
        assert_eq!(api.method_url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }

    #[test]
    fn updates_decode_messages_and_callbacks() {
        let raw = r##"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "from": {"id": 7, "username": "ana"},
                  "chat": {"id": 7, "type": "private"}, "text": "#wifi - x"}},
                {"update_id": 11, "callback_query": {"id": "cb", "from": {"id": 7},
                  "message": {"message_id": 2, "chat": {"id": 7}}, "data": "wipe:no"}},
                {"update_id": 12, "edited_message": {"message_id": 3}}
            ]
        }"##;

        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).expect("decode");
        let updates = response.result.expect("result");

        assert!(response.ok);
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message.as_ref().and_then(|m| m.text.as_deref()), Some("#wifi - x"));
        assert_eq!(
            updates[1].callback_query.as_ref().and_then(|c| c.data.as_deref()),
            Some("wipe:no")
        );
        assert!(updates[2].message.is_none() && updates[2].callback_query.is_none());
    }

    #[test]
    fn error_responses_carry_a_description() {
        let raw = r#"{"ok": false, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).expect("decode");
        assert!(!response.ok);
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }
}
