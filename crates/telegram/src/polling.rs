use std::sync::atomic::{AtomicI64, Ordering};
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{TransportError, Update};
use crate::events::{EventContext, EventDispatcher, HandlerResult, UpdateEnvelope};
use crate::reply::{NoopReplySink, ReplySink};

#[derive(Debug, Error)]
pub enum PollingError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("polling gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Where updates come from. `Ok(None)` means the stream is closed for good.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateSource;

#[async_trait]
impl UpdateSource for NoopUpdateSource {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_batch(&self, _offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        Ok(None)
    }
}

pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    sink: Arc<dyn ReplySink>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    /// Next `getUpdates` offset; 0 until the first update is seen.
    next_offset: AtomicI64,
    noop: bool,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            source: Arc::new(NoopUpdateSource),
            sink: Arc::new(NoopReplySink),
            dispatcher: EventDispatcher::default(),
            reconnect_policy: ReconnectPolicy::default(),
            next_offset: AtomicI64::new(0),
            noop: true,
        }
    }
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        sink: Arc<dyn ReplySink>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, sink, dispatcher, reconnect_policy, next_offset: AtomicI64::new(0), noop: false }
    }

    pub fn is_noop_transport(&self) -> bool {
        self.noop
    }

    /// Polls until the source closes. Consecutive failures back off and are
    /// retried; any successful batch resets the retry budget.
    pub async fn start(&self) -> Result<(), PollingError> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(&mut attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.telegram.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "telegram polling transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "ingress.telegram.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "telegram polling retries exhausted"
                        );
                        return Err(PollingError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: transport_error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: &mut u32) -> Result<(), TransportError> {
        info!(attempt = *attempt, "opening telegram polling connection");
        self.source.connect().await?;
        info!(attempt = *attempt, "telegram polling connected");

        loop {
            let offset = match self.next_offset.load(Ordering::Relaxed) {
                0 => None,
                offset => Some(offset),
            };
            let Some(batch) = self.source.next_batch(offset).await? else {
                info!(attempt = *attempt, "telegram update stream closed");
                return Ok(());
            };
            *attempt = 0;

            for update in batch {
                self.handle_update(update).await;
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        // Advance first so a poisoned update is never fetched twice.
        self.next_offset.fetch_max(update.update_id + 1, Ordering::Relaxed);

        let envelope = UpdateEnvelope::from(update);
        let context = EventContext::for_update(envelope.update_id);
        let user_id = envelope.event.user_id().map(|user| user.0).unwrap_or_default();

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = envelope.update_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %context.correlation_id,
            user_id,
            "received telegram update"
        );

        let actions = match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(HandlerResult::Responded(actions)) => actions,
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
            Err(error) => {
                warn!(
                    event_name = "ingress.telegram.dispatch_failed",
                    correlation_id = %context.correlation_id,
                    user_id,
                    error = %error,
                    "event dispatch failed; continuing polling loop"
                );
                return;
            }
        };

        for action in &actions {
            match self.sink.deliver(action).await {
                Ok(()) => debug!(
                    event_name = "egress.telegram.delivered",
                    correlation_id = %context.correlation_id,
                    method = action.method(),
                    "delivered reply"
                ),
                Err(error) => warn!(
                    event_name = "egress.telegram.delivery_failed",
                    correlation_id = %context.correlation_id,
                    method = action.method(),
                    error = %error,
                    "failed to deliver reply"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{PollingError, PollingRunner, ReconnectPolicy, UpdateSource};
    use crate::api::{Chat, Message, TransportError, Update, User};
    use crate::events::{
        EventContext, EventDispatcher, EventHandlerError, TextMessageEvent, TextMessageHandler,
        TextMessageService,
    };
    use crate::reply::{OutboundAction, ReplySink};

    #[derive(Default)]
    struct ScriptedSource {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        batches: VecDeque<Result<Option<Vec<Update>>, TransportError>>,
        connect_attempts: usize,
        offsets: Vec<Option<i64>>,
    }

    impl ScriptedSource {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            batches: Vec<Result<Option<Vec<Update>>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    batches: batches.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn offsets(&self) -> Vec<Option<i64>> {
            self.state.lock().await.offsets.clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_batch(
            &self,
            offset: Option<i64>,
        ) -> Result<Option<Vec<Update>>, TransportError> {
            let mut state = self.state.lock().await;
            state.offsets.push(offset);
            state.batches.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<OutboundAction>>,
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn deliver(&self, action: &OutboundAction) -> Result<(), TransportError> {
            self.delivered.lock().await.push(action.clone());
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl TextMessageService for Echo {
        async fn handle_text_message(
            &self,
            event: &TextMessageEvent,
            _ctx: &EventContext,
        ) -> Result<Vec<OutboundAction>, EventHandlerError> {
            Ok(vec![OutboundAction::plain(event.chat_id, event.text.to_uppercase())])
        }
    }

    fn text_update(update_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                from: Some(User { id: 3, username: None }),
                chat: Chat { id: 3 },
                text: Some(text.to_owned()),
            }),
            callback_query: None,
        }
    }

    fn instant_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn echo_dispatcher() -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(Echo));
        dispatcher
    }

    #[tokio::test]
    async fn delivers_replies_and_advances_offset() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![],
            vec![Ok(Some(vec![text_update(41, "hi"), text_update(42, "there")])), Ok(None)],
        ));
        let sink = Arc::new(RecordingSink::default());
        let runner =
            PollingRunner::new(source.clone(), sink.clone(), echo_dispatcher(), instant_policy(1));

        runner.start().await.expect("runner stops cleanly");

        assert_eq!(source.offsets().await, vec![None, Some(43)]);
        assert_eq!(
            *sink.delivered.lock().await,
            vec![OutboundAction::plain(3, "HI"), OutboundAction::plain(3, "THERE")]
        );
    }

    #[tokio::test]
    async fn reconnects_after_failures_and_keeps_offset() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(()), Ok(())],
            vec![
                Ok(Some(vec![text_update(7, "a")])),
                Err(TransportError::Receive("reset".to_owned())),
                Ok(None),
            ],
        ));
        let runner = PollingRunner::new(
            source.clone(),
            Arc::new(RecordingSink::default()),
            echo_dispatcher(),
            instant_policy(2),
        );

        runner.start().await.expect("runner recovers");

        assert_eq!(source.connect_attempts().await, 3);
        assert_eq!(source.offsets().await, vec![None, Some(8), Some(8)]);
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_failures() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));
        let runner = PollingRunner::new(
            source.clone(),
            Arc::new(RecordingSink::default()),
            EventDispatcher::default(),
            instant_policy(2),
        );

        let error = runner.start().await.expect_err("retries run out");
        assert!(matches!(error, PollingError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(source.connect_attempts().await, 3);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0).as_millis(), 100);
        assert_eq!(policy.backoff(2).as_millis(), 400);
        assert_eq!(policy.backoff(9).as_millis(), 1_000);
    }

    #[test]
    fn default_runner_is_noop() {
        assert!(PollingRunner::default().is_noop_transport());
    }
}
