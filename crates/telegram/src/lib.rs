//! Telegram integration - long-polling bot interface
//!
//! This crate provides the chat interface for Reco:
//! - **Bot API client** (`api`) - `getUpdates`, `sendMessage`, `answerCallbackQuery`, `editMessageText`
//! - **Polling** (`polling`) - long-polling loop with reconnect backoff
//! - **Events** (`events`) - classifies updates and routes them to handlers
//! - **Commands** (`commands`) - `/start`, `/help`, `/feedback`, owner reports
//! - **Keyboards** (`keyboards`) - inline buttons and their callback payloads
//! - **Assistant** (`assistant`) - runs each message line through the resolver and storage
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → Assistant → repositories
//!                   ↓
//!             ReplySink ← OutboundAction
//! ```
//!
//! Handlers never talk to Telegram directly. They return a list of
//! [`reply::OutboundAction`] values and the runner delivers them in order.

pub mod api;
pub mod assistant;
pub mod commands;
pub mod events;
pub mod keyboards;
pub mod polling;
pub mod reply;

pub use api::{TelegramApi, TransportError};
pub use assistant::{assistant_dispatcher, Assistant, AssistantSettings};
pub use events::{EventDispatcher, UpdateEnvelope};
pub use polling::{PollingRunner, ReconnectPolicy};
pub use reply::{OutboundAction, ReplySink};
