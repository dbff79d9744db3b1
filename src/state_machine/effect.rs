//! Effects produced by state transitions

use super::state::Turn;
use crate::llm::LlmErrorKind;
use serde_json::Value;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the in-memory conversation
    AppendTurn(Turn),

    /// Append records to the transcript store under `conversation_id`
    PersistTurns {
        conversation_id: String,
        turns: Vec<Turn>,
    },

    /// Ask the LLM for the next interviewer reply to `history`
    RequestReply { history: Vec<Turn> },

    /// Ask the LLM for a story about the interviewee
    RequestStory { transcript: String },

    /// Abort the outstanding LLM call
    AbortLlm,

    /// Mail the transcript and article to the configured recipients
    SendMail { transcript: String, article: String },

    /// Empty the conversation and take a fresh identifier
    ResetConversation,

    /// Notify connected clients
    NotifyClient { event_type: String, data: Value },
}

impl Effect {
    pub fn persist(conversation_id: &str, turns: Vec<Turn>) -> Self {
        Effect::PersistTurns {
            conversation_id: conversation_id.to_string(),
            turns,
        }
    }

    pub fn notify_state_change(state: &str) -> Self {
        Effect::NotifyClient {
            event_type: "state_change".to_string(),
            data: serde_json::json!({ "state": state }),
        }
    }

    pub fn notify_turn(turn: &Turn) -> Self {
        Effect::NotifyClient {
            event_type: "turn".to_string(),
            data: serde_json::json!({ "role": turn.role, "content": turn.content }),
        }
    }

    pub fn notify_completed(article: &str) -> Self {
        Effect::NotifyClient {
            event_type: "completed".to_string(),
            data: serde_json::json!({ "article": article }),
        }
    }

    pub fn notify_error(message: &str) -> Self {
        Effect::NotifyClient {
            event_type: "error".to_string(),
            data: serde_json::json!({ "message": message }),
        }
    }

    /// A failed reply; `retryable` tells the client whether resubmitting can help
    pub fn notify_llm_error(message: &str, kind: LlmErrorKind) -> Self {
        Effect::NotifyClient {
            event_type: "error".to_string(),
            data: serde_json::json!({
                "message": message,
                "kind": kind,
                "retryable": kind.is_transient(),
            }),
        }
    }
}
