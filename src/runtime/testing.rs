//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{ReplySettings, SessionRuntime, SessionSnapshot, SseEvent};
use crate::llm::{FragmentStream, LlmError, LlmRequest, LlmResponse};
use crate::mail::{MailError, MailMessage};
use crate::state_machine::{Event, InterviewContext};
use crate::store::{StoreResult, TranscriptRecord};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued replies.
///
/// Each reply is a list of fragments: `stream` yields them one by one,
/// `complete` returns them joined.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<Vec<String>, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.queue_fragments(&[response.text.as_str()]);
    }

    pub fn queue_fragments(&self, fragments: &[&str]) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(fragments.iter().map(ToString::to_string).collect()));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &LlmRequest) -> Result<Vec<String>, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next(request).map(|fragments| LlmResponse::text(fragments.concat()))
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError> {
        let fragments = self.next(request)?;
        Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Delayed Mock LLM Client (for cancellation testing)
// ============================================================================

/// Mock LLM client with configurable delay
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
    /// Set once a request outlives its delay
    pub finished: AtomicBool,
}

impl DelayedMockLlmClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(),
            delay,
            request_started: Arc::new(Notify::new()),
            finished: AtomicBool::new(false),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }

    async fn wait(&self) {
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmClient for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.wait().await;
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError> {
        self.wait().await;
        self.inner.stream(request).await
    }

    fn model_id(&self) -> &str {
        "delayed-mock-model"
    }
}

// ============================================================================
// Panicking LLM Client
// ============================================================================

/// LLM client that answers from its queue and panics once the queue is
/// empty, standing in for a provider bug
#[derive(Default)]
pub struct PanickingLlmClient {
    inner: MockLlmClient,
}

impl PanickingLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }

    fn check(&self) {
        assert!(
            !self.inner.replies.lock().unwrap().is_empty(),
            "provider bug"
        );
    }
}

#[async_trait]
impl LlmClient for PanickingLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.check();
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream, LlmError> {
        self.check();
        self.inner.stream(request).await
    }

    fn model_id(&self) -> &str {
        "panicking-mock-model"
    }
}

// ============================================================================
// In-Memory Transcript Store
// ============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    transcripts: Mutex<HashMap<String, Vec<TranscriptRecord>>>,
    fail_appends: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    pub fn records(&self, conversation_id: &str) -> Vec<TranscriptRecord> {
        self.transcripts
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn append(&self, conversation_id: &str, records: &[TranscriptRecord]) -> StoreResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full").into());
        }
        self.transcripts
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> StoreResult<Option<Vec<TranscriptRecord>>> {
        Ok(self
            .transcripts
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned())
    }
}

// ============================================================================
// Recording Mailer
// ============================================================================

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailDispatcher for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Timeout);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ============================================================================
// Test Session Harness
// ============================================================================

pub fn test_settings(stream: bool) -> ReplySettings {
    ReplySettings {
        system_prompt: "You are an interviewer.".to_string(),
        max_tokens: 256,
        temperature: 0.7,
        stream,
    }
}

/// A running session wired to mocks
pub struct TestSession<L: LlmClient + 'static> {
    pub llm: Arc<L>,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub shutdown: CancellationToken,
}

impl<L: LlmClient + 'static> TestSession<L> {
    pub fn start(llm: L, mailer: RecordingMailer, stream: bool) -> Self {
        let llm = Arc::new(llm);
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(mailer);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(256);
        let shutdown = CancellationToken::new();

        let runtime = SessionRuntime::new(
            "test-session".to_string(),
            InterviewContext::default(),
            test_settings(stream),
            Arc::clone(&llm),
            Arc::clone(&store),
            Arc::clone(&mailer),
            event_rx,
            broadcast_tx,
            shutdown.clone(),
        );
        let snapshot_rx = runtime.subscribe_snapshots();
        tokio::spawn(runtime.run());

        Self {
            llm,
            store,
            mailer,
            event_tx,
            broadcast_rx,
            snapshot_rx,
            shutdown,
        }
    }

    /// Stop the runtime the way destroying a session does
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub async fn send(&self, event: Event) {
        self.event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    /// Wait until the snapshot satisfies `pred`
    pub async fn wait_for_snapshot(
        &mut self,
        pred: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        tokio::time::timeout(Duration::from_secs(2), self.snapshot_rx.wait_for(pred))
            .await
            .expect("Timed out waiting for snapshot")
            .expect("Runtime dropped")
            .clone()
    }

    /// Start the interview and return the seeded snapshot
    pub async fn start_interview(&mut self) -> SessionSnapshot {
        self.send(Event::Start).await;
        self.wait_for_snapshot(|s| s.turns.len() == 2).await
    }

    /// Wait for the next broadcast event matching `pred`
    pub async fn wait_for_event(&mut self, mut pred: impl FnMut(&SseEvent) -> bool) -> SseEvent {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.broadcast_rx.recv()).await {
                Ok(Ok(event)) if pred(&event) => return event,
                Ok(Ok(_) | Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) => panic!("Broadcast closed"),
                Err(_) => panic!("Timed out waiting for event"),
            }
        }
    }
}

pub fn is_error(event: &SseEvent) -> bool {
    match event {
        SseEvent::Error { .. } => true,
        SseEvent::Notify { event_type, .. } => event_type == "error",
        _ => false,
    }
}

pub fn error_message(event: &SseEvent) -> String {
    match event {
        SseEvent::Error { message } => message.clone(),
        SseEvent::Notify { data, .. } => data["message"].as_str().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use crate::runtime::{SessionManager, SessionServices};
    use crate::state_machine::{InterviewState, Role, Turn};

    /// Start, one exchange: store holds the seed pair plus the reply
    #[tokio::test]
    async fn test_first_exchange_persists_three_records() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Nice to meet you, Sam. Where did you grow up?"));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;
        assert_eq!(seeded.state, InterviewState::AwaitingUser);

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let snapshot = session.wait_for_snapshot(|s| s.turns.len() == 4).await;

        assert_eq!(snapshot.state, InterviewState::AwaitingUser);
        assert_eq!(snapshot.turns[2], Turn::user("Hi, I'm Sam"));

        let records = session.store.records(&seeded.conversation_id);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].role, Role::User);
        assert_eq!(records[1].role, Role::Assistant);
        assert_eq!(
            records[2].content,
            "Nice to meet you, Sam. Where did you grow up?"
        );

        // Full history and the script went to the model
        let requests = session.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 3);
        assert_eq!(requests[0].system.as_deref(), Some("You are an interviewer."));
        assert_eq!(requests[0].temperature, Some(0.7));
    }

    /// A marker reply mails transcript and article, then resets
    #[tokio::test]
    async fn test_marker_reply_mails_and_resets() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Thanks! <article>Sam's Story</article>"));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let old_id = seeded.conversation_id.clone();
        let snapshot = session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;

        assert_eq!(snapshot.state, InterviewState::NotStarted);
        assert!(snapshot.turns.is_empty());

        let sent = session.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("You: Hi, I'm Sam"));
        assert!(sent[0]
            .body
            .contains("Chatbot: Thanks! <article>Sam's Story</article>"));
        assert!(sent[0].body.ends_with("Generated Story:\n\nSam's Story"));

        // The completing reply was stored under the old identifier
        assert_eq!(session.store.records(&old_id).len(), 3);
    }

    /// Transport error: nothing appended, resubmission works without duplicates
    #[tokio::test]
    async fn test_llm_error_leaves_turns_unchanged() {
        let llm = MockLlmClient::new();
        llm.queue_error(LlmError::network("Connection failed: refused"));
        llm.queue_response(LlmResponse::text("Welcome, Sam."));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        session.start_interview().await;

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let error = session.wait_for_event(is_error).await;
        assert!(error_message(&error).contains("Connection failed"));

        let snapshot = session
            .wait_for_snapshot(|s| s.state == InterviewState::AwaitingUser)
            .await;
        assert_eq!(snapshot.turns.len(), 2);

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let snapshot = session.wait_for_snapshot(|s| s.turns.len() == 4).await;
        let sam_turns = snapshot
            .turns
            .iter()
            .filter(|t| t.content == "Hi, I'm Sam")
            .count();
        assert_eq!(sam_turns, 1);
    }

    /// Mail failure still resets and is surfaced
    #[tokio::test]
    async fn test_mail_failure_still_resets() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Thanks! <article>Sam's Story</article>"));

        let mut session = TestSession::start(llm, RecordingMailer::failing(), false);
        let seeded = session.start_interview().await;

        session.send(Event::user_message("Hi, I'm Sam")).await;
        // The mail error arrives before the completion notice
        let first = session
            .wait_for_event(|e| {
                is_error(e)
                    || matches!(e, SseEvent::Notify { event_type, .. } if event_type == "completed")
            })
            .await;
        assert!(is_error(&first));
        assert!(error_message(&first).contains("could not be mailed"));
        session
            .wait_for_event(|e| matches!(e, SseEvent::Notify { event_type, .. } if event_type == "completed"))
            .await;

        let old_id = seeded.conversation_id.clone();
        let snapshot = session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;
        assert!(snapshot.turns.is_empty());
        assert_eq!(snapshot.state, InterviewState::NotStarted);
        assert_eq!(session.store.records(&old_id).len(), 3);
    }

    /// Store failure is reported but the exchange still lands in memory
    #[tokio::test]
    async fn test_store_failure_does_not_block_chat() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Where did you grow up?"));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        session.store.fail_appends();

        session.send(Event::Start).await;
        let error = session.wait_for_event(is_error).await;
        assert!(error_message(&error).contains("could not be saved"));

        session.wait_for_snapshot(|s| s.turns.len() == 2).await;
        session.send(Event::user_message("Hi, I'm Sam")).await;
        session.wait_for_snapshot(|s| s.turns.len() == 4).await;
    }

    /// Streamed fragments reach clients in order and join into one turn
    #[tokio::test]
    async fn test_streamed_reply_emits_deltas() {
        let llm = MockLlmClient::new();
        llm.queue_fragments(&["Nice ", "to meet ", "you, Sam."]);

        let mut session = TestSession::start(llm, RecordingMailer::new(), true);
        session.start_interview().await;
        session.send(Event::user_message("Hi, I'm Sam")).await;

        let mut deltas = Vec::new();
        while deltas.len() < 3 {
            if let SseEvent::Delta { text } = session
                .wait_for_event(|e| matches!(e, SseEvent::Delta { .. }))
                .await
            {
                deltas.push(text);
            }
        }
        assert_eq!(deltas, vec!["Nice ", "to meet ", "you, Sam."]);

        let snapshot = session.wait_for_snapshot(|s| s.turns.len() == 4).await;
        assert_eq!(snapshot.turns[3], Turn::assistant("Nice to meet you, Sam."));
    }

    /// A second message while the reply is pending is rejected
    #[tokio::test]
    async fn test_message_rejected_while_awaiting_reply() {
        let llm = DelayedMockLlmClient::new(Duration::from_millis(300));
        llm.queue_response(LlmResponse::text("Welcome."));
        let started = Arc::clone(&llm.request_started);

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        session.start_interview().await;

        session.send(Event::user_message("Hi")).await;
        started.notified().await;
        session.send(Event::user_message("Hello?")).await;

        let error = session.wait_for_event(|e| matches!(e, SseEvent::Error { .. })).await;
        assert!(error_message(&error).contains("waiting"));

        let snapshot = session.wait_for_snapshot(|s| s.turns.len() == 4).await;
        assert_eq!(snapshot.turns[2], Turn::user("Hi"));
    }

    /// quit after an exchange generates a story and mails it
    #[tokio::test]
    async fn test_end_word_generates_story() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Where did you grow up?"));
        llm.queue_response(LlmResponse::text("Sam grew up by the sea."));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;

        session.send(Event::user_message("Hi, I'm Sam")).await;
        session.wait_for_snapshot(|s| s.turns.len() == 4).await;

        session.send(Event::user_message("quit")).await;
        let old_id = seeded.conversation_id.clone();
        session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;

        let sent = session.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Chatbot: Where did you grow up?"));
        assert!(sent[0].body.ends_with("Sam grew up by the sea."));

        let story_request = &session.llm.recorded_requests()[1];
        assert!(story_request.messages[0]
            .content
            .contains("You: Hi, I'm Sam"));
    }

    /// Story failure resets without mailing
    #[tokio::test]
    async fn test_story_failure_resets_without_mail() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("Where did you grow up?"));
        llm.queue_error(LlmError::server_error("Server error: overloaded"));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;
        session.send(Event::user_message("Hi, I'm Sam")).await;
        session.wait_for_snapshot(|s| s.turns.len() == 4).await;

        session.send(Event::EndRequested).await;
        let error = session.wait_for_event(is_error).await;
        assert!(error_message(&error).contains("Story generation failed"));

        let old_id = seeded.conversation_id.clone();
        session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;
        assert!(session.mailer.sent().is_empty());
    }

    /// Abandon during a pending reply drops the late result
    #[tokio::test]
    async fn test_abandon_discards_pending_reply() {
        let llm = DelayedMockLlmClient::new(Duration::from_millis(200));
        llm.queue_response(LlmResponse::text("Too late"));
        let started = Arc::clone(&llm.request_started);

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;
        session.send(Event::user_message("Hi")).await;
        started.notified().await;

        session.send(Event::Abandon).await;
        let old_id = seeded.conversation_id.clone();
        session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = session.snapshot_rx.borrow().clone();
        assert_eq!(snapshot.state, InterviewState::NotStarted);
        assert!(snapshot.turns.is_empty());
        assert!(!session.llm.finished.load(Ordering::SeqCst));
        assert_eq!(session.store.records(&old_id).len(), 2);
    }

    /// Destroying a session cancels its in-flight request
    #[tokio::test]
    async fn test_destroy_cancels_in_flight_request() {
        let llm = Arc::new(DelayedMockLlmClient::new(Duration::from_millis(300)));
        llm.queue_response(LlmResponse::text("Never seen"));
        let store = Arc::new(InMemoryStore::new());

        let manager = SessionManager::new(SessionServices {
            llm: llm.clone(),
            store: store.clone(),
            mailer: Arc::new(RecordingMailer::new()),
            context: InterviewContext::default(),
            settings: test_settings(true),
        });

        let id = manager.create().await;
        manager.send_event(&id, Event::Start).await.unwrap();
        manager
            .send_event(&id, Event::user_message("Hi"))
            .await
            .unwrap();
        llm.request_started.notified().await;

        let conversation_id = manager.snapshot(&id).await.unwrap().conversation_id;
        assert!(manager.destroy(&id).await);
        assert!(!manager.destroy(&id).await);
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.send_event(&id, Event::Start).await.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!llm.finished.load(Ordering::SeqCst));
        assert_eq!(store.records(&conversation_id).len(), 2);
    }

    /// A panicking provider surfaces as a failed turn; the user can resubmit
    #[tokio::test]
    async fn test_provider_panic_returns_to_awaiting_user() {
        for stream in [false, true] {
            let mut session =
                TestSession::start(PanickingLlmClient::new(), RecordingMailer::new(), stream);
            session.start_interview().await;

            session.send(Event::user_message("Hi")).await;
            let error = session.wait_for_event(is_error).await;
            assert!(error_message(&error).contains("failed unexpectedly"));
            let snapshot = session
                .wait_for_snapshot(|s| s.state == InterviewState::AwaitingUser)
                .await;
            assert_eq!(snapshot.turns.len(), 2);

            // Resubmission is accepted, not rejected as still waiting
            session.send(Event::user_message("Hi")).await;
            let error = session.wait_for_event(is_error).await;
            assert!(error_message(&error).contains("failed unexpectedly"));
        }
    }

    /// A panicking story call still resets the conversation
    #[tokio::test]
    async fn test_story_panic_resets() {
        let llm = PanickingLlmClient::new();
        llm.queue_response(LlmResponse::text("Where did you grow up?"));

        let mut session = TestSession::start(llm, RecordingMailer::new(), false);
        let seeded = session.start_interview().await;
        session.send(Event::user_message("Hi, I'm Sam")).await;
        session.wait_for_snapshot(|s| s.turns.len() == 4).await;

        // The story call panics
        session.send(Event::EndRequested).await;
        let error = session.wait_for_event(is_error).await;
        assert!(error_message(&error).contains("Story generation failed unexpectedly"));

        let old_id = seeded.conversation_id.clone();
        let snapshot = session
            .wait_for_snapshot(|s| s.conversation_id != old_id)
            .await;
        assert_eq!(snapshot.state, InterviewState::NotStarted);
        assert!(session.mailer.sent().is_empty());
    }

    /// Replies are trimmed; a blank reply is a failed turn
    #[tokio::test]
    async fn test_blank_reply_is_failed_turn() {
        let llm = MockLlmClient::new();
        llm.queue_response(LlmResponse::text("   \n "));
        llm.queue_fragments(&["  Where did ", "you grow up?  "]);

        let mut session = TestSession::start(llm, RecordingMailer::new(), true);
        session.start_interview().await;

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let error = session.wait_for_event(is_error).await;
        assert!(error_message(&error).contains("empty reply"));
        let snapshot = session
            .wait_for_snapshot(|s| s.state == InterviewState::AwaitingUser)
            .await;
        assert_eq!(snapshot.turns.len(), 2);

        session.send(Event::user_message("Hi, I'm Sam")).await;
        let snapshot = session.wait_for_snapshot(|s| s.turns.len() == 4).await;
        assert_eq!(snapshot.turns[3], Turn::assistant("Where did you grow up?"));
    }

    /// Stopping the runtime closes its event channel
    #[tokio::test]
    async fn test_stop_ends_runtime() {
        let session = TestSession::start(MockLlmClient::new(), RecordingMailer::new(), false);
        session.stop();

        let closed = tokio::time::timeout(Duration::from_secs(2), session.event_tx.closed()).await;
        assert!(closed.is_ok());
        assert!(session.event_tx.send(Event::Start).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new();
        mock.queue_fragments(&["a", "b"]);
        mock.queue_error(LlmError::auth("Invalid API key"));

        let request = LlmRequest::new(vec![]);
        assert_eq!(mock.complete(&request).await.unwrap().text, "ab");

        let err = mock.complete(&request).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);

        // Nothing left queued
        assert!(mock.stream(&request).await.is_err());
    }
}
