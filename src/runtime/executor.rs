//! Session runtime executor

use super::traits::{LlmClient, MailDispatcher, TranscriptStore};
use super::{ReplySettings, SessionSnapshot, SseEvent};

use crate::llm::{drain_fragments, LlmErrorKind};
use crate::mail::MailMessage;
use crate::state_machine::{
    transition, Conversation, Effect, Event, InterviewContext, InterviewState, Turn,
};
use crate::store::TranscriptRecord;
use crate::story::{generate_story, story_request};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// LLM results tagged with the request generation they answer
type LlmResult = (u64, Event);

/// Generic session runtime that can work with any LLM, store and mailer
pub struct SessionRuntime<L, S, M>
where
    L: LlmClient + ?Sized + 'static,
    S: TranscriptStore + ?Sized + 'static,
    M: MailDispatcher + ?Sized + 'static,
{
    session_id: String,
    context: InterviewContext,
    settings: ReplySettings,
    state: InterviewState,
    conversation: Conversation,
    llm: Arc<L>,
    store: Arc<S>,
    mailer: Arc<M>,
    event_rx: mpsc::Receiver<Event>,
    llm_tx: mpsc::Sender<LlmResult>,
    llm_rx: mpsc::Receiver<LlmResult>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
    /// Token to cancel the outstanding LLM request
    llm_cancel_token: Option<CancellationToken>,
    /// Bumped on every request and abort; results from older generations are dropped
    llm_generation: u64,
}

impl<L, S, M> SessionRuntime<L, S, M>
where
    L: LlmClient + ?Sized + 'static,
    S: TranscriptStore + ?Sized + 'static,
    M: MailDispatcher + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        context: InterviewContext,
        settings: ReplySettings,
        llm: Arc<L>,
        store: Arc<S>,
        mailer: Arc<M>,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let state = InterviewState::NotStarted;
        let conversation = Conversation::new();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            state: state.clone(),
            conversation_id: conversation.id.clone(),
            turns: Vec::new(),
        });
        let (llm_tx, llm_rx) = mpsc::channel(4);

        Self {
            session_id,
            context,
            settings,
            state,
            conversation,
            llm,
            store,
            mailer,
            event_rx,
            llm_tx,
            llm_rx,
            broadcast_tx,
            snapshot_tx,
            shutdown,
            llm_cancel_token: None,
            llm_generation: 0,
        }
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.abort_llm();
                    break;
                }

                Some((generation, event)) = self.llm_rx.recv() => {
                    if generation == self.llm_generation {
                        self.handle(event).await;
                    } else {
                        tracing::debug!(
                            session_id = %self.session_id,
                            generation,
                            "Dropping stale LLM result"
                        );
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    self.handle(event).await;
                }

                else => break,
            }
        }

        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    async fn handle(&mut self, event: Event) {
        tracing::debug!(session_id = %self.session_id, event = ?event, "Processing event");

        let result = match transition(&self.state, &self.conversation, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                // Rejections are user-facing (e.g., "still waiting for the reply")
                tracing::warn!(
                    session_id = %self.session_id,
                    state = self.state.display_name(),
                    error = %e,
                    "Event rejected"
                );
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        self.publish_snapshot();
    }

    /// Execute one effect. Store and mail failures are surfaced, never propagated.
    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendTurn(turn) => {
                self.conversation.turns.push(turn);
            }

            Effect::PersistTurns {
                conversation_id,
                turns,
            } => {
                self.persist(&conversation_id, &turns).await;
            }

            Effect::RequestReply { history } => {
                let request = self.settings.reply_request(&history);
                let stream = self.settings.stream;
                let llm = Arc::clone(&self.llm);
                let broadcast_tx = self.broadcast_tx.clone();

                let on_panic = Event::LlmFailed {
                    message: "The interviewer failed unexpectedly".to_string(),
                    kind: LlmErrorKind::Unknown,
                };
                self.spawn_llm(on_panic, async move {
                    tracing::info!(messages = request.messages.len(), stream, "Requesting reply");
                    let result = if stream {
                        match llm.stream(&request).await {
                            Ok(fragments) => {
                                drain_fragments(fragments, |text| {
                                    let _ = broadcast_tx.send(SseEvent::Delta {
                                        text: text.to_string(),
                                    });
                                })
                                .await
                            }
                            Err(e) => Err(e),
                        }
                    } else {
                        llm.complete(&request).await.map(|r| r.text)
                    };

                    match result {
                        Ok(text) if !text.trim().is_empty() => Event::LlmReply {
                            text: text.trim().to_string(),
                        },
                        Ok(_) => Event::LlmFailed {
                            message: "The model returned an empty reply".to_string(),
                            kind: LlmErrorKind::Unknown,
                        },
                        Err(e) => Event::LlmFailed {
                            message: e.message,
                            kind: e.kind,
                        },
                    }
                });
            }

            Effect::RequestStory { transcript } => {
                let request =
                    story_request(&transcript, self.settings.max_tokens, self.settings.temperature);
                let llm = Arc::clone(&self.llm);

                let on_panic = Event::StoryFailed {
                    message: "Story generation failed unexpectedly".to_string(),
                };
                self.spawn_llm(on_panic, async move {
                    match generate_story(&*llm, &request).await {
                        Ok(story) => Event::StoryReady { story },
                        Err(e) => Event::StoryFailed {
                            message: format!("Story generation failed: {}", e.message),
                        },
                    }
                });
            }

            Effect::AbortLlm => self.abort_llm(),

            Effect::SendMail {
                transcript,
                article,
            } => {
                let message = MailMessage::interview(&transcript, &article);
                if let Err(e) = self.mailer.send(&message).await {
                    tracing::error!(session_id = %self.session_id, error = %e, "Mail dispatch failed");
                    let _ = self.broadcast_tx.send(SseEvent::Error {
                        message: format!("Transcript could not be mailed: {e}"),
                    });
                }
            }

            Effect::ResetConversation => {
                if self.conversation.is_started() {
                    tracing::info!(
                        session_id = %self.session_id,
                        conversation_id = %self.conversation.id,
                        turns = self.conversation.turns.len(),
                        "Conversation reset"
                    );
                }
                self.conversation.reset();
            }

            Effect::NotifyClient { event_type, data } => {
                self.notify(event_type, data);
            }
        }
    }

    /// Run `work` as the single outstanding LLM request.
    ///
    /// A panic inside `work` is reported as `on_panic` so the session never
    /// stays busy.
    fn spawn_llm<F>(&mut self, on_panic: Event, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        self.abort_llm();
        let generation = self.llm_generation;
        let cancel_token = CancellationToken::new();
        self.llm_cancel_token = Some(cancel_token.clone());
        let llm_tx = self.llm_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!("LLM request cancelled");
                }

                result = AssertUnwindSafe(work).catch_unwind() => {
                    let event = result.unwrap_or_else(|_| {
                        tracing::error!(generation, "LLM task panicked");
                        on_panic
                    });
                    let _ = llm_tx.send((generation, event)).await;
                }
            }
        });
    }

    fn abort_llm(&mut self) {
        if let Some(token) = self.llm_cancel_token.take() {
            token.cancel();
        }
        self.llm_generation += 1;
    }

    async fn persist(&self, conversation_id: &str, turns: &[Turn]) {
        let now = Utc::now();
        let records: Vec<_> = turns
            .iter()
            .map(|turn| TranscriptRecord::from_turn(turn, now))
            .collect();

        match self.store.append(conversation_id, &records).await {
            Ok(()) => tracing::debug!(
                conversation_id = %conversation_id,
                records = records.len(),
                "Transcript appended"
            ),
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Transcript append failed");
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: format!("Transcript could not be saved: {e}"),
                });
            }
        }
    }

    fn notify(&self, event_type: String, data: Value) {
        let _ = self
            .broadcast_tx
            .send(SseEvent::Notify { event_type, data });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state.clone(),
            conversation_id: self.conversation.id.clone(),
            turns: self.conversation.turns.clone(),
        });
    }
}
