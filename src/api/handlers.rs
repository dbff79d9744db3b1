//! HTTP request handlers

use super::assets::{index_html, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, CreateSessionResponse, ErrorResponse, QueuedResponse, SuccessResponse,
    TranscriptResponse,
};
use super::AppState;
use crate::runtime::{SessionError, SessionSnapshot, SseEvent};
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat widget
        .route("/", get(serve_index))
        .route("/assets/*path", get(serve_static))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/:id",
            get(get_session).delete(destroy_session),
        )
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/start", post(start_interview))
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/end", post(end_interview))
        .route("/api/sessions/:id/abandon", post(abandon_interview))
        // Stored transcripts
        .route("/api/transcripts/:conversation_id", get(get_transcript))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn serve_index() -> impl IntoResponse {
    match index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - chat widget not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.create().await;
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn destroy_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.destroy(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.snapshot(&id).await?))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (broadcast_rx, snapshot) = state.sessions.subscribe(&id).await?;
    Ok(sse_stream(SseEvent::Init { snapshot }, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================
//
// Actions are queued; whether the session accepts them is reported on the
// session's event stream.

async fn start_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    queue(&state, &id, Event::Start).await
}

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }
    queue(&state, &id, Event::user_message(req.text)).await
}

async fn end_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    queue(&state, &id, Event::EndRequested).await
}

async fn abandon_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    queue(&state, &id, Event::Abandon).await
}

async fn queue(
    state: &AppState,
    id: &str,
    event: Event,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    state.sessions.send_event(id, event).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

// ============================================================
// Transcripts
// ============================================================

async fn get_transcript(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let records = state
        .sessions
        .store()
        .load(&conversation_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Transcript not found: {conversation_id}")))?;

    Ok(Json(TranscriptResponse {
        conversation_id,
        records,
    }))
}

async fn get_version(State(state): State<AppState>) -> String {
    format!(
        "interview-bot {} ({})",
        env!("CARGO_PKG_VERSION"),
        state.sessions.model_id()
    )
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Gone(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::Gone(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
