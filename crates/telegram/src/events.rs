use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use reco_core::domain::record::UserId;

use crate::api::Update;
use crate::commands::{
    parse_phrase_command, parse_slash_command, CommandRouteError, CommandRouter, CommandService,
    SlashCommandPayload,
};
use crate::reply::OutboundAction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub event: TelegramEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    SlashCommand(SlashCommandPayload),
    TextMessage(TextMessageEvent),
    CallbackQuery(CallbackQueryEvent),
    Unsupported { event_type: String },
}

impl TelegramEvent {
    pub fn event_type(&self) -> TelegramEventType {
        match self {
            Self::SlashCommand(_) => TelegramEventType::SlashCommand,
            Self::TextMessage(_) => TelegramEventType::TextMessage,
            Self::CallbackQuery(_) => TelegramEventType::CallbackQuery,
            Self::Unsupported { .. } => TelegramEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::SlashCommand(payload) => Some(payload.user_id),
            Self::TextMessage(event) => Some(event.user_id),
            Self::CallbackQuery(event) => Some(event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TelegramEventType {
    SlashCommand,
    TextMessage,
    CallbackQuery,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackQueryEvent {
    pub callback_id: String,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Chat and message of the keyboard that was pressed, when Telegram
    /// still has it.
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub data: String,
}

impl CallbackQueryEvent {
    /// Private chats share the user id, so fall back to it.
    pub fn reply_chat_id(&self) -> i64 {
        self.chat_id.unwrap_or(self.user_id.0)
    }
}

impl From<Update> for UpdateEnvelope {
    fn from(update: Update) -> Self {
        let update_id = update.update_id;
        let event = if let Some(query) = update.callback_query {
            TelegramEvent::CallbackQuery(CallbackQueryEvent {
                callback_id: query.id,
                user_id: UserId(query.from.id),
                username: query.from.username,
                chat_id: query.message.as_ref().map(|message| message.chat.id),
                message_id: query.message.as_ref().map(|message| message.message_id),
                data: query.data.unwrap_or_default(),
            })
        } else if let Some(message) = update.message {
            classify_message(message)
        } else {
            TelegramEvent::Unsupported { event_type: "other_update".to_owned() }
        };

        Self { update_id, event }
    }
}

fn classify_message(message: crate::api::Message) -> TelegramEvent {
    let (Some(from), Some(text)) = (message.from, message.text) else {
        return TelegramEvent::Unsupported { event_type: "non_text_message".to_owned() };
    };

    let command = parse_slash_command(&text)
        .map(|(command, args)| (command, args, true))
        .or_else(|| parse_phrase_command(&text).map(|word| (word, String::new(), false)));

    match command {
        Some((command, args, slash)) => TelegramEvent::SlashCommand(SlashCommandPayload {
            command,
            args,
            slash,
            user_id: UserId(from.id),
            username: from.username,
            chat_id: message.chat.id,
        }),
        None => TelegramEvent::TextMessage(TextMessageEvent {
            chat_id: message.chat.id,
            message_id: message.message_id,
            user_id: UserId(from.id),
            username: from.username,
            text,
        }),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn for_update(update_id: i64) -> Self {
        Self { correlation_id: format!("update-{update_id}") }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<OutboundAction>),
    Processed,
    Ignored,
}

impl HandlerResult {
    fn from_actions(actions: Vec<OutboundAction>) -> Self {
        if actions.is_empty() {
            Self::Processed
        } else {
            Self::Responded(actions)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("text message handler failure: {0}")]
    TextMessage(String),
    #[error("callback handler failure: {0}")]
    Callback(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> TelegramEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<TelegramEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: CommandService,
{
    pub fn new(service: S, owner: Option<UserId>) -> Self {
        Self { router: CommandRouter::new(service, owner) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: CommandService + 'static,
{
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let actions = self.router.route(payload).await?;
        Ok(HandlerResult::from_actions(actions))
    }
}

#[async_trait]
pub trait TextMessageService: Send + Sync {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OutboundAction>, EventHandlerError>;
}

pub struct TextMessageHandler<S> {
    service: S,
}

impl<S> TextMessageHandler<S>
where
    S: TextMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: TextMessageService + 'static,
{
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::TextMessage
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::TextMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let actions = self.service.handle_text_message(event, ctx).await?;
        Ok(HandlerResult::from_actions(actions))
    }
}

#[async_trait]
pub trait CallbackQueryService: Send + Sync {
    async fn handle_callback_query(
        &self,
        event: &CallbackQueryEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OutboundAction>, EventHandlerError>;
}

pub struct CallbackQueryHandler<S> {
    service: S,
}

impl<S> CallbackQueryHandler<S>
where
    S: CallbackQueryService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CallbackQueryHandler<S>
where
    S: CallbackQueryService + 'static,
{
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::CallbackQuery
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::CallbackQuery(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let actions = self.service.handle_callback_query(event, ctx).await?;
        Ok(HandlerResult::from_actions(actions))
    }
}
