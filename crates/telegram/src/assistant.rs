//! The assistant turns one chat message into storage calls and replies.
//!
//! A message is split into command lines, each line is resolved on its own and
//! executed in order, and the per-line replies are joined into one HTML reply.
//! A failing line reports its own error and never stops the lines after it.
//! Usage events are recorded best-effort: a failed event write is logged and
//! the reply goes out anyway.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info, warn};

use reco_core::clock::Clock;
use reco_core::config::AppConfig;
use reco_core::domain::event::{EventKind, NewEvent};
use reco_core::domain::feedback::ReactionAction;
use reco_core::domain::record::{NewRecord, UserId};
use reco_core::engagement::{
    distinct_local_days, pmf_follow_up, pmf_prompt, NudgeKind, PmfEligibility, PmfPolicy,
};
use reco_core::errors::ApplicationError;
use reco_core::insights::{
    parse_top_args, top_invalid_range, top_usage, PmfDistribution, ReportRange, TopArgs,
    TopReport, UsageStats, STATS_WINDOW_DAYS,
};
use reco_core::intent::{
    is_slash_command, is_wipe_request, looks_like_command, CommandResolver, Intent, PAGE_SIZE,
    QUERY_LIMIT,
};
use reco_core::lines::split_lines;
use reco_core::render::{self, StorageAction};
use reco_core::session::SessionStore;
use reco_core::text::{escape_html, normalize_key, to_plain_spaces};
use reco_db::repositories::{
    EventRepository, FeedbackRepository, RecordRepository, RepositoryError,
};

use crate::commands::{CommandRouteError, CommandService, SlashCommandPayload};
use crate::events::{
    CallbackQueryEvent, CallbackQueryHandler, CallbackQueryService, EventContext,
    EventDispatcher, EventHandlerError, SlashCommandHandler, TextMessageEvent,
    TextMessageHandler, TextMessageService,
};
use crate::keyboards::{pmf_keyboard, usefulness_keyboard, wipe_keyboard, CallbackData};
use crate::reply::{html_chunks, OutboundAction};

const USEFUL_PROMPT: &str = "¿Te fue útil?";
const WIPE_PROMPT: &str =
    "⚠️ ¿Seguro que quieres <b>borrar TODOS</b> tus recordatorios? Esta acción no se puede deshacer.";

#[derive(Clone, Debug)]
pub struct AssistantSettings {
    pub owner_id: Option<UserId>,
    pub local_tz: Tz,
    pub pmf_policy: PmfPolicy,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self { owner_id: None, local_tz: chrono_tz::Europe::Madrid, pmf_policy: PmfPolicy::default() }
    }
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            owner_id: config.telegram.owner_chat_id.map(UserId),
            local_tz: config.engagement.local_tz,
            pmf_policy: PmfPolicy {
                debug_always: config.engagement.pmf_debug_always,
                ..PmfPolicy::default()
            },
        }
    }
}

#[derive(Clone)]
pub struct Assistant {
    records: Arc<dyn RecordRepository>,
    events: Arc<dyn EventRepository>,
    feedback: Arc<dyn FeedbackRepository>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    resolver: Arc<CommandResolver>,
    settings: AssistantSettings,
}

/// Reply text for one line, plus the action to count for the usefulness
/// prompt when the line was a tracked command.
struct LineOutcome {
    text: String,
    reaction: Option<ReactionAction>,
}

impl LineOutcome {
    fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), reaction: None }
    }

    fn prompted(text: impl Into<String>, action: ReactionAction) -> Self {
        Self { text: text.into(), reaction: Some(action) }
    }
}

impl Assistant {
    pub fn new(
        records: Arc<dyn RecordRepository>,
        events: Arc<dyn EventRepository>,
        feedback: Arc<dyn FeedbackRepository>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            records,
            events,
            feedback,
            sessions,
            clock,
            resolver: Arc::new(CommandResolver::default()),
            settings,
        }
    }

    pub fn with_resolver(mut self, resolver: CommandResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub async fn process_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Vec<OutboundAction> {
        let now = self.clock.now();
        let user = event.user_id;
        let chat_id = event.chat_id;

        if is_slash_command(&event.text) {
            return Vec::new();
        }

        let plain = to_plain_spaces(&event.text);
        if !plain.is_empty()
            && !looks_like_command(&plain)
            && self.sessions.is_awaiting_feedback(user, now).await
        {
            return self.capture_survey_feedback(event, &plain, now).await;
        }

        if is_wipe_request(&plain) {
            self.log_event(NewEvent::new(user, EventKind::WipePrompt, now)).await;
            return vec![OutboundAction::html(chat_id, WIPE_PROMPT).with_keyboard(wipe_keyboard())];
        }

        let lines = split_lines(&event.text);
        let mut outputs = Vec::with_capacity(lines.len());
        let mut prompts = Vec::new();
        for line in &lines {
            let intent = self.resolver.resolve(line);
            debug!(
                event_name = "assistant.line.resolved",
                correlation_id = %ctx.correlation_id,
                user_id = user.0,
                intent = intent.kind().as_str(),
                "resolved command line"
            );

            let outcome = self.execute(user, intent, now, ctx).await;
            outputs.push(outcome.text);
            if let Some(action) = outcome.reaction {
                if self.sessions.should_ask(user, action).await {
                    prompts.push(action);
                }
            }
        }

        let mut actions = html_chunks(chat_id, &outputs.join("\n"));
        actions.extend(prompts.into_iter().map(|action| {
            OutboundAction::plain(chat_id, USEFUL_PROMPT).with_keyboard(usefulness_keyboard(action))
        }));
        actions.extend(self.pmf_prompt_if_due(user, chat_id, now).await);
        actions.extend(self.nudge_if_due(user, chat_id, now).await);

        info!(
            event_name = "assistant.message.processed",
            correlation_id = %ctx.correlation_id,
            user_id = user.0,
            lines = lines.len(),
            replies = actions.len(),
            "processed chat message"
        );
        actions
    }

    async fn execute(
        &self,
        user: UserId,
        intent: Intent,
        now: DateTime<Utc>,
        ctx: &EventContext,
    ) -> LineOutcome {
        match intent {
            Intent::ListAll { page } => self.list_all(user, page, now).await,
            Intent::Save { key, value } => self.save(user, &key, &value, now, ctx).await,
            Intent::Edit { key, value } => self.edit(user, &key, &value, now).await,
            Intent::EditHelp { key } => LineOutcome::text(render::edit_help(&key)),
            Intent::Query { text } => self.query(user, &text, now).await,
            Intent::Delete { key } => self.delete(user, &key, now).await,
            Intent::Unrecognized { sample } => {
                self.log_event(
                    NewEvent::new(user, EventKind::Unrecognized, now)
                        .with_meta(json!({ "sample": sample })),
                )
                .await;
                LineOutcome::text(render::unrecognized())
            }
        }
    }

    async fn list_all(&self, user: UserId, page: u32, now: DateTime<Utc>) -> LineOutcome {
        let offset = render::page_offset(page, PAGE_SIZE);
        let text = match self.records.list_page(user, offset, PAGE_SIZE).await {
            Ok(listing) => render::list_page(page, PAGE_SIZE, listing.total, &listing.records),
            Err(error) => self.storage_failure(user, StorageAction::List, None, &error),
        };
        self.log_event(NewEvent::new(user, EventKind::List, now)).await;
        LineOutcome::text(text)
    }

    async fn save(
        &self,
        user: UserId,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
        ctx: &EventContext,
    ) -> LineOutcome {
        let record = match NewRecord::new(user, key, value) {
            Ok(record) => record,
            Err(error) => {
                let rejected =
                    ApplicationError::from(error).into_interface(ctx.correlation_id.clone());
                return LineOutcome::text(rejected.user_message());
            }
        };

        let key_norm = record.key_norm.clone();
        let text = match self.records.upsert(record, now).await {
            Ok(stored) => render::saved(&stored),
            Err(error) => self.storage_failure(user, StorageAction::Save, Some(key), &error),
        };
        self.log_event(
            NewEvent::new(user, EventKind::Save, now).with_meta(json!({ "key_norm": key_norm })),
        )
        .await;
        LineOutcome::prompted(text, ReactionAction::Save)
    }

    async fn edit(&self, user: UserId, key: &str, value: &str, now: DateTime<Utc>) -> LineOutcome {
        let key_text = to_plain_spaces(key);
        let key_norm = normalize_key(&key_text);
        if key_norm.is_empty() {
            return LineOutcome::text(render::edit_help(""));
        }
        let value = to_plain_spaces(value);
        if value.is_empty() {
            return LineOutcome::text(render::edit_help(&key_text));
        }

        match self.records.update_value(user, &key_norm, &key_text, &value, now).await {
            Ok(Some(record)) => {
                self.log_event(
                    NewEvent::new(user, EventKind::Edit, now)
                        .with_meta(json!({ "key_norm": key_norm })),
                )
                .await;
                LineOutcome::prompted(render::updated(&record), ReactionAction::Edit)
            }
            Ok(None) => LineOutcome::text(render::edit_not_found(&key_text)),
            Err(error) => LineOutcome::text(self.storage_failure(
                user,
                StorageAction::Edit,
                Some(&key_text),
                &error,
            )),
        }
    }

    async fn query(&self, user: UserId, text: &str, now: DateTime<Utc>) -> LineOutcome {
        let needle = normalize_key(text);
        let found = if needle.is_empty() {
            Ok(Vec::new())
        } else {
            self.records.search_substring(user, &needle, QUERY_LIMIT).await
        };

        let (reply, results) = match found {
            Ok(records) => (render::query_results(text, &records), records.len()),
            Err(error) => (self.storage_failure(user, StorageAction::Query, Some(text), &error), 0),
        };
        self.log_event(
            NewEvent::new(user, EventKind::Query, now)
                .with_meta(json!({ "key_norm": needle, "results": results })),
        )
        .await;
        LineOutcome::prompted(reply, ReactionAction::Query)
    }

    async fn delete(&self, user: UserId, key: &str, now: DateTime<Utc>) -> LineOutcome {
        let key_text = to_plain_spaces(key);
        let key_norm = normalize_key(&key_text);
        let removed =
            if key_norm.is_empty() { Ok(None) } else { self.records.delete_exact(user, &key_norm).await };

        let reply = match removed {
            Ok(Some(record)) => render::deleted(&record),
            Ok(None) => render::delete_not_found(&key_text),
            Err(error) => self.storage_failure(user, StorageAction::Delete, Some(&key_text), &error),
        };
        self.log_event(
            NewEvent::new(user, EventKind::Delete, now).with_meta(json!({ "key_norm": key_norm })),
        )
        .await;
        LineOutcome::prompted(reply, ReactionAction::Delete)
    }

    fn storage_failure(
        &self,
        user: UserId,
        action: StorageAction,
        subject: Option<&str>,
        error: &RepositoryError,
    ) -> String {
        warn!(
            event_name = "assistant.storage_failed",
            user_id = user.0,
            action = ?action,
            error = %error,
            "storage call failed for command line"
        );
        render::storage_error(action, subject, &error.to_string())
    }

    async fn capture_survey_feedback(
        &self,
        event: &TextMessageEvent,
        text: &str,
        now: DateTime<Utc>,
    ) -> Vec<OutboundAction> {
        let user = event.user_id;
        if let Err(error) = self.feedback.record_feedback(user, text, now).await {
            warn!(
                event_name = "assistant.feedback_store_failed",
                user_id = user.0,
                error = %error,
                "failed to store survey feedback"
            );
        }
        self.sessions.clear_feedback_window(user).await;

        let mut actions: Vec<OutboundAction> = self
            .forward_to_owner("Feedback (post-PMF)", user, event.username.as_deref(), text)
            .into_iter()
            .collect();
        actions.push(OutboundAction::plain(event.chat_id, "¡Muchas gracias por tu idea! 💚"));
        actions
    }

    fn forward_to_owner(
        &self,
        heading: &str,
        user: UserId,
        username: Option<&str>,
        text: &str,
    ) -> Option<OutboundAction> {
        self.settings.owner_id.map(|owner| {
            OutboundAction::plain(
                owner.0,
                format!("📝 {heading} de {user} (@{}):\n{text}", username.unwrap_or("—")),
            )
        })
    }

    async fn log_event(&self, event: NewEvent) {
        let user = event.user_id;
        let kind = event.kind;
        if let Err(error) = self.events.append(event).await {
            warn!(
                event_name = "assistant.event_log_failed",
                user_id = user.0,
                kind = kind.as_str(),
                error = %error,
                "failed to record usage event"
            );
        }
    }

    pub async fn pmf_eligibility(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<PmfEligibility, RepositoryError> {
        let policy = self.settings.pmf_policy;
        let activity = self.events.activity_since(user, policy.usage_since(now)).await?;
        let answered = self.feedback.pmf_answered_since(user, policy.cooldown_since(now)).await?;
        Ok(policy.evaluate(distinct_local_days(&activity, self.settings.local_tz), answered))
    }

    async fn pmf_prompt_if_due(
        &self,
        user: UserId,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Option<OutboundAction> {
        match self.pmf_eligibility(user, now).await {
            Ok(eligibility) if eligibility.should_ask() => {
                info!(
                    event_name = "assistant.pmf.asked",
                    user_id = user.0,
                    distinct_days = eligibility.distinct_days,
                    "asking pmf survey"
                );
                Some(OutboundAction::plain(chat_id, pmf_prompt()).with_keyboard(pmf_keyboard()))
            }
            Ok(_) => None,
            Err(error) => {
                warn!(
                    event_name = "assistant.pmf.check_failed",
                    user_id = user.0,
                    error = %error,
                    "could not evaluate pmf eligibility"
                );
                None
            }
        }
    }

    /// The nudge that applies right now, if any. Record count picks the
    /// candidate; idle time and the per-nudge cooldown decide.
    pub async fn due_nudge(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<NudgeKind>, RepositoryError> {
        let record_count = self.records.count_for_owner(user).await?;
        let Some(kind) = NudgeKind::for_record_count(record_count) else {
            return Ok(None);
        };

        let anchor = self.events.last_event_at(user, kind.idle_since_event()).await?;
        if !kind.is_idle(anchor, now) {
            return Ok(None);
        }
        let sent_recently =
            self.events.exists_since(user, kind.event_kind(), now - kind.cooldown()).await?;
        Ok((!sent_recently).then_some(kind))
    }

    async fn nudge_if_due(
        &self,
        user: UserId,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Option<OutboundAction> {
        match self.due_nudge(user, now).await {
            Ok(Some(kind)) => {
                let text = pick_nudge_text(kind);
                self.log_event(NewEvent::new(user, kind.event_kind(), now)).await;
                info!(
                    event_name = "assistant.nudge.sent",
                    user_id = user.0,
                    nudge = kind.number(),
                    "sending re-engagement nudge"
                );
                Some(OutboundAction::html(chat_id, text))
            }
            Ok(None) => None,
            Err(error) => {
                warn!(
                    event_name = "assistant.nudge.check_failed",
                    user_id = user.0,
                    error = %error,
                    "could not evaluate nudges"
                );
                None
            }
        }
    }

    pub async fn process_callback(
        &self,
        event: &CallbackQueryEvent,
        ctx: &EventContext,
    ) -> Vec<OutboundAction> {
        let now = self.clock.now();
        let user = event.user_id;
        let answer = |text: &str| OutboundAction::answer(&event.callback_id, Some(text.to_owned()));

        match CallbackData::parse(&event.data) {
            CallbackData::Pmf(score) => {
                if let Err(error) = self.feedback.record_pmf_answer(user, score, now).await {
                    return vec![answer(self.unavailable(user, ctx, &error))];
                }
                self.sessions.open_feedback_window(user, now).await;
                vec![
                    answer(&format!("¡Gracias! ({}/5)", score.value())),
                    OutboundAction::plain(event.reply_chat_id(), pmf_follow_up()),
                ]
            }
            CallbackData::WipeCancel => vec![
                answer("Borrado cancelado"),
                replace_prompt(event, "Operación cancelada. No se borró nada."),
            ],
            CallbackData::WipeConfirm => {
                let outcome = match self.records.delete_all_for_owner(user).await {
                    Ok(deleted) => {
                        self.log_event(
                            NewEvent::new(user, EventKind::WipeAll, now)
                                .with_meta(json!({ "deleted": deleted })),
                        )
                        .await;
                        let count = render::pluralize(deleted, "recordatorio", "recordatorios");
                        format!("🧹 He borrado {count}.")
                    }
                    Err(error) => self.storage_failure(user, StorageAction::Delete, None, &error),
                };
                vec![answer("Borrando…"), replace_prompt(event, &outcome)]
            }
            CallbackData::Reaction { action, useful } => {
                if let Err(error) =
                    self.feedback.record_quick_reaction(user, action, useful, now).await
                {
                    return vec![answer(self.unavailable(user, ctx, &error))];
                }
                vec![answer(if useful { "¡Muchas gracias! 🙌" } else { "Muchas gracias por avisar 💡" })]
            }
            CallbackData::Unknown(raw) => {
                debug!(
                    event_name = "assistant.callback.unknown",
                    correlation_id = %ctx.correlation_id,
                    data = %raw,
                    "acknowledging unknown callback payload"
                );
                vec![OutboundAction::answer(&event.callback_id, None)]
            }
        }
    }

    fn unavailable(&self, user: UserId, ctx: &EventContext, error: &RepositoryError) -> &'static str {
        warn!(
            event_name = "assistant.callback_store_failed",
            correlation_id = %ctx.correlation_id,
            user_id = user.0,
            error = %error,
            "failed to store callback answer"
        );
        ApplicationError::Persistence(error.to_string())
            .into_interface(ctx.correlation_id.clone())
            .user_message()
    }

    async fn usage_stats(&self, now: DateTime<Utc>) -> Result<UsageStats, RepositoryError> {
        let owner = self.settings.owner_id;
        let total_records = self.records.count_all(owner).await?;
        let events =
            self.events.events_since(now - Duration::days(STATS_WINDOW_DAYS), owner).await?;
        Ok(UsageStats::compute(total_records, &events, now, self.settings.local_tz))
    }

    async fn top_report(&self, range: &ReportRange) -> Result<TopReport, RepositoryError> {
        let owner = self.settings.owner_id;
        let saves =
            self.events.events_in_range(EventKind::Save, range.since, range.until, owner).await?;
        let queries =
            self.events.events_in_range(EventKind::Query, range.since, range.until, owner).await?;
        Ok(TopReport::build(range, &saves, &queries))
    }
}

fn pick_nudge_text(kind: NudgeKind) -> &'static str {
    kind.pick_text(&mut rand::thread_rng())
}

/// Edits the message that carried the keyboard, or sends a new one when
/// Telegram did not include it.
fn replace_prompt(event: &CallbackQueryEvent, text: &str) -> OutboundAction {
    match (event.chat_id, event.message_id) {
        (Some(chat_id), Some(message_id)) => {
            OutboundAction::EditMessage { chat_id, message_id, text: text.to_owned() }
        }
        _ => OutboundAction::plain(event.reply_chat_id(), text),
    }
}

fn report_reply(chat_id: i64, command: &str, report: Result<String, RepositoryError>) -> OutboundAction {
    match report {
        Ok(text) => OutboundAction::html(chat_id, text),
        Err(error) => {
            warn!(
                event_name = "assistant.report_failed",
                command,
                error = %error,
                "owner report failed"
            );
            OutboundAction::html(
                chat_id,
                format!("⚠️ Error en /{command}: {}", escape_html(&error.to_string())),
            )
        }
    }
}

#[async_trait]
impl TextMessageService for Assistant {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OutboundAction>, EventHandlerError> {
        Ok(self.process_message(event, ctx).await)
    }
}

#[async_trait]
impl CallbackQueryService for Assistant {
    async fn handle_callback_query(
        &self,
        event: &CallbackQueryEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OutboundAction>, EventHandlerError> {
        Ok(self.process_callback(event, ctx).await)
    }
}

#[async_trait]
impl CommandService for Assistant {
    async fn start(
        &self,
        source: Option<String>,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        // Only the real /start counts as a start for nudge timing.
        if payload.slash {
            let mut event = NewEvent::new(payload.user_id, EventKind::Start, self.clock.now());
            if let Some(source) = source {
                event = event.with_meta(json!({ "source": source }));
            }
            self.log_event(event).await;
        }
        Ok(vec![OutboundAction::html(payload.chat_id, render::welcome_message())])
    }

    async fn whoami(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        Ok(vec![OutboundAction::plain(
            payload.chat_id,
            format!("Tu chat_id es: {}", payload.user_id),
        )])
    }

    async fn feedback(
        &self,
        text: &str,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let user = payload.user_id;
        if let Err(error) = self.feedback.record_feedback(user, text, self.clock.now()).await {
            let message = ApplicationError::Persistence(error.to_string())
                .into_interface(format!("chat-{}", payload.chat_id))
                .user_message();
            return Ok(vec![OutboundAction::plain(payload.chat_id, message)]);
        }

        let mut actions: Vec<OutboundAction> = self
            .forward_to_owner("Feedback", user, payload.username.as_deref(), text)
            .into_iter()
            .collect();
        actions.push(OutboundAction::plain(
            payload.chat_id,
            "¡Muchas gracias! 💚 Me ayuda muchísimo a mejorar.",
        ));
        Ok(actions)
    }

    async fn survey(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        Ok(self
            .pmf_prompt_if_due(payload.user_id, payload.chat_id, self.clock.now())
            .await
            .into_iter()
            .collect())
    }

    async fn debug_pmf(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let report = self
            .pmf_eligibility(payload.user_id, self.clock.now())
            .await
            .map(|eligibility| escape_html(&eligibility.describe()));
        Ok(vec![report_reply(payload.chat_id, "debugpmf", report)])
    }

    async fn stats(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let report = self.usage_stats(self.clock.now()).await.map(|stats| stats.render());
        Ok(vec![report_reply(payload.chat_id, "stats", report)])
    }

    async fn pmf_report(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let report = self
            .feedback
            .pmf_scores(self.settings.owner_id)
            .await
            .map(|scores| PmfDistribution::from_scores(&scores).render());
        Ok(vec![report_reply(payload.chat_id, "pmf", report)])
    }

    async fn top(
        &self,
        args: &str,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let chat_id = payload.chat_id;
        let reply = match parse_top_args(args, self.clock.now(), self.settings.local_tz) {
            TopArgs::Usage => OutboundAction::plain(chat_id, top_usage()),
            TopArgs::Invalid(error) => {
                debug!(event_name = "assistant.top.invalid_range", error = %error, "rejected /top range");
                OutboundAction::plain(chat_id, top_invalid_range())
            }
            TopArgs::Range(range) => {
                report_reply(chat_id, "top", self.top_report(&range).await.map(|report| report.render()))
            }
        };
        Ok(vec![reply])
    }

    async fn nudge(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Vec<OutboundAction>, CommandRouteError> {
        let nudge = self.nudge_if_due(payload.user_id, payload.chat_id, self.clock.now()).await;
        Ok(vec![nudge.unwrap_or_else(|| {
            OutboundAction::plain(payload.chat_id, "Ahora mismo no te toca ningún nudge.")
        })])
    }
}

/// Wires the assistant into every handler slot of a dispatcher.
pub fn assistant_dispatcher(assistant: Assistant) -> EventDispatcher {
    let owner = assistant.settings.owner_id;
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(assistant.clone(), owner));
    dispatcher.register(TextMessageHandler::new(assistant.clone()));
    dispatcher.register(CallbackQueryHandler::new(assistant));
    dispatcher
}
