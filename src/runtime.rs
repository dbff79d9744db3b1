//! Runtime for executing interview sessions
//!
//! Each session owns one conversation and runs as its own task. Events reach
//! it over an `mpsc` channel; clients follow along on a broadcast channel and
//! read the latest snapshot from a `watch` channel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::llm::LlmRequest;
use crate::state_machine::{Event, InterviewContext, InterviewState, Turn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long a session may sit with no stream and no action before eviction
pub const IDLE_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Type alias for the production runtime with trait-object services
pub type ProductionRuntime = SessionRuntime<dyn LlmClient, dyn TranscriptStore, dyn MailDispatcher>;

/// Generation parameters for interviewer replies
#[derive(Debug, Clone)]
pub struct ReplySettings {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Stream fragments to clients as they arrive
    pub stream: bool,
}

impl ReplySettings {
    /// Full history plus the fixed system instruction
    pub fn reply_request(&self, history: &[Turn]) -> LlmRequest {
        LlmRequest::new(history.iter().map(Turn::to_llm_message).collect())
            .with_system(self.system_prompt.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

/// Everything a session needs besides its own state
pub struct SessionServices {
    pub llm: Arc<dyn LlmClient>,
    pub store: Arc<dyn TranscriptStore>,
    pub mailer: Arc<dyn MailDispatcher>,
    pub context: InterviewContext,
    pub settings: ReplySettings,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: InterviewState,
    pub conversation_id: String,
    pub turns: Vec<Turn>,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: SessionSnapshot },
    /// One streamed fragment of the pending reply
    Delta { text: String },
    /// Notification produced by a transition (`turn`, `state_change`, ...)
    Notify { event_type: String, data: Value },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {0} has stopped")]
    Closed(String),
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    shutdown: CancellationToken,
    last_active: Instant,
}

/// Manager for all session runtimes
pub struct SessionManager {
    services: SessionServices,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new session in `NotStarted` and return its id
    pub async fn create(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(256);
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            session_id.clone(),
            self.services.context.clone(),
            self.services.settings.clone(),
            Arc::clone(&self.services.llm),
            Arc::clone(&self.services.store),
            Arc::clone(&self.services.mailer),
            event_rx,
            broadcast_tx.clone(),
            shutdown.clone(),
        );
        let snapshot_rx = runtime.subscribe_snapshots();

        let id = session_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %id, "Session runtime finished");
        });

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                event_tx,
                broadcast_tx,
                snapshot_rx,
                shutdown,
                last_active: Instant::now(),
            },
        );

        tracing::info!(session_id = %session_id, "Session created");
        session_id
    }

    /// Stop a session, cancelling any outstanding LLM call.
    ///
    /// Returns false if the session did not exist.
    pub async fn destroy(&self, session_id: &str) -> bool {
        let Some(handle) = self.sessions.write().await.remove(session_id) else {
            return false;
        };
        handle.shutdown.cancel();
        tracing::info!(session_id = %session_id, "Session destroyed");
        true
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Queue an event; rejections are reported to subscribers
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), SessionError> {
        let handle = self.touch(session_id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))
    }

    /// Subscribe to updates, returning the snapshot to open with
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(broadcast::Receiver<SseEvent>, SessionSnapshot), SessionError> {
        let handle = self.touch(session_id).await?;
        let rx = handle.broadcast_tx.subscribe();
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok((rx, snapshot))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.get(session_id).await?;
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }

    /// Mark a session active and return its handle
    async fn touch(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.last_active = Instant::now();
        Ok(handle.clone())
    }

    /// Destroy sessions with no connected stream and no action for `max_idle`.
    ///
    /// Returns how many were evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<String> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, h)| {
                h.broadcast_tx.receiver_count() == 0 && h.last_active.elapsed() >= max_idle
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut evicted = 0;
        for id in idle {
            if self.destroy(&id).await {
                tracing::info!(session_id = %id, "Idle session evicted");
                evicted += 1;
            }
        }
        evicted
    }

    /// Periodically evict sessions idle for longer than `max_idle`
    pub fn spawn_idle_reaper(self: &Arc<Self>, max_idle: Duration) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(IDLE_CHECK_INTERVAL);
            loop {
                tick.tick().await;
                manager.evict_idle(max_idle).await;
            }
        });
    }

    pub fn store(&self) -> &Arc<dyn TranscriptStore> {
        &self.services.store
    }

    pub fn model_id(&self) -> &str {
        self.services.llm.model_id()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
