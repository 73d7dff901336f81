use async_trait::async_trait;
use thiserror::Error;

use reco_core::domain::record::UserId;
use reco_core::engagement::nudge_preview;
use reco_core::errors::ApplicationError;
use reco_core::render;

use crate::reply::OutboundAction;

/// A `/command` or one of the bare command words, with its sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    /// Lowercase name without the slash or the `@botname` suffix.
    pub command: String,
    pub args: String,
    /// `false` for bare words such as `help`.
    pub slash: bool,
    pub user_id: UserId,
    pub username: Option<String>,
    pub chat_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start { source: Option<String> },
    Help,
    FeedbackHint,
    WhoAmI,
    Feedback { text: String },
    Survey,
    DebugPmf,
    Stats,
    PmfReport,
    Top { args: String },
    Nudge,
    NudgePreview,
    Unknown { name: String },
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Help => "help",
            Self::FeedbackHint | Self::Feedback { .. } => "feedback",
            Self::WhoAmI => "whoami",
            Self::Survey => "encuesta",
            Self::DebugPmf => "debugpmf",
            Self::Stats => "stats",
            Self::PmfReport => "pmf",
            Self::Top { .. } => "top",
            Self::Nudge => "nudge",
            Self::NudgePreview => "nudges",
            Self::Unknown { .. } => "unknown",
        }
    }

    pub fn is_owner_only(&self) -> bool {
        matches!(self, Self::Stats | Self::PmfReport | Self::Top { .. } | Self::Nudge | Self::NudgePreview)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// `/name@bot args` → `("name", "args")`.
pub fn parse_slash_command(text: &str) -> Option<(String, String)> {
    let body = text.trim().strip_prefix('/')?;
    let (head, args) = match body.find(char::is_whitespace) {
        Some(index) => (&body[..index], body[index..].trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or_default();
    if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
        return None;
    }
    Some((name.to_lowercase(), args.to_owned()))
}

/// Whole-message words that act like commands.
pub fn parse_phrase_command(text: &str) -> Option<String> {
    let word = text.trim().to_lowercase();
    matches!(word.as_str(), "start" | "help" | "feedback" | "nudges").then_some(word)
}

pub fn classify_command(payload: &SlashCommandPayload) -> BotCommand {
    let args = payload.args.trim();
    match (payload.command.as_str(), payload.slash) {
        ("start", true) => {
            BotCommand::Start { source: (!args.is_empty()).then(|| args.to_owned()) }
        }
        ("start", false) => BotCommand::Start { source: None },
        ("help", _) => BotCommand::Help,
        ("feedback", false) => BotCommand::FeedbackHint,
        ("feedback", true) => BotCommand::Feedback { text: args.to_owned() },
        ("whoami", true) => BotCommand::WhoAmI,
        ("encuesta", true) => BotCommand::Survey,
        ("debugpmf", true) => BotCommand::DebugPmf,
        ("stats", true) => BotCommand::Stats,
        ("pmf", true) => BotCommand::PmfReport,
        ("top", true) => BotCommand::Top { args: args.to_owned() },
        ("nudge", true) => BotCommand::Nudge,
        ("nudges", _) => BotCommand::NudgePreview,
        (name, _) => BotCommand::Unknown { name: name.to_owned() },
    }
}

#[async_trait]
pub trait CommandService: Send + Sync {
    async fn start(
        &self,
        source: Option<String>,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn whoami(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn feedback(
        &self,
        text: &str,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn survey(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn debug_pmf(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn stats(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn pmf_report(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn top(
        &self,
        args: &str,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;

    async fn nudge(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
    owner: Option<UserId>,
}

impl<S> CommandRouter<S>
where
    S: CommandService,
{
    pub fn new(service: S, owner: Option<UserId>) -> Self {
        Self { service, owner }
    }

    pub async fn route(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let command = classify_command(payload);
        let chat_id = payload.chat_id;

        if command.is_owner_only() && self.owner != Some(payload.user_id) {
            // Bare words from other users are left alone entirely.
            if !payload.slash {
                return Ok(Vec::new());
            }
            let refusal = ApplicationError::OwnerOnly { command: format!("/{}", command.name()) }
                .into_interface(format!("chat-{chat_id}"));
            return Ok(vec![OutboundAction::plain(chat_id, refusal.user_message())]);
        }

        match command {
            BotCommand::Start { source } => self.service.start(source, payload).await,
            BotCommand::Help => Ok(vec![OutboundAction::html(chat_id, render::help_message())]),
            BotCommand::FeedbackHint => {
                Ok(vec![OutboundAction::plain(chat_id, "Escribe:\n/feedback Tu mensaje aquí")])
            }
            BotCommand::WhoAmI => self.service.whoami(payload).await,
            BotCommand::Feedback { text } if text.is_empty() => Ok(vec![OutboundAction::plain(
                chat_id,
                "✍️ Ejemplo:\n/feedback Estaría bien exportar todo a TXT",
            )]),
            BotCommand::Feedback { text } => self.service.feedback(&text, payload).await,
            BotCommand::Survey => self.service.survey(payload).await,
            BotCommand::DebugPmf => self.service.debug_pmf(payload).await,
            BotCommand::Stats => self.service.stats(payload).await,
            BotCommand::PmfReport => self.service.pmf_report(payload).await,
            BotCommand::Top { args } => self.service.top(&args, payload).await,
            BotCommand::Nudge => self.service.nudge(payload).await,
            BotCommand::NudgePreview => Ok(nudge_preview()
                .into_iter()
                .map(|preview| OutboundAction::html(chat_id, preview))
                .collect()),
            BotCommand::Unknown { .. } => Ok(Vec::new()),
        }
    }
}
