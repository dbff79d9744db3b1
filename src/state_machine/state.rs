//! Interview state types

use crate::llm::{LlmMessage, MessageRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Prefix used when rendering a transcript line
    pub fn transcript_label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Chatbot",
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// One side of a request/response cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn to_llm_message(&self) -> LlmMessage {
        LlmMessage {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// Ordered turns plus the identifier they are stored under.
///
/// Started when `turns` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        !self.turns.is_empty()
    }

    /// Drop all turns and take a fresh identifier
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Role-prefixed lines in turn order
    pub fn transcript(&self) -> String {
        render_transcript(&self.turns)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.transcript_label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Where the interview is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterviewState {
    /// No turns yet
    #[default]
    NotStarted,

    /// Seeded or last reply received; user may type
    AwaitingUser,

    /// One LLM call outstanding for `pending`, which is not yet a turn
    AwaitingAssistant { pending: String },

    /// User ended the interview; the story request is outstanding
    Concluding,
}

impl InterviewState {
    /// Name reported to clients
    pub fn display_name(&self) -> &'static str {
        match self {
            InterviewState::NotStarted => "not_started",
            InterviewState::AwaitingUser => "awaiting_user",
            InterviewState::AwaitingAssistant { .. } => "awaiting_assistant",
            InterviewState::Concluding => "concluding",
        }
    }

    /// Whether an LLM call is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            InterviewState::AwaitingAssistant { .. } | InterviewState::Concluding
        )
    }
}

/// Delimiters around the article in a completing reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMarkers {
    pub open: String,
    pub close: String,
}

impl Default for CompletionMarkers {
    fn default() -> Self {
        Self {
            open: "<article>".to_string(),
            close: "</article>".to_string(),
        }
    }
}

/// Fixed inputs to the transition function
#[derive(Debug, Clone)]
pub struct InterviewContext {
    pub markers: CompletionMarkers,
    /// Seed user line
    pub kickoff: String,
    /// Seed assistant line
    pub greeting: String,
    /// User inputs treated as an explicit end, compared case-insensitively
    pub end_words: Vec<String>,
}

impl InterviewContext {
    pub fn seed_turns(&self) -> [Turn; 2] {
        [
            Turn::user(self.kickoff.clone()),
            Turn::assistant(self.greeting.clone()),
        ]
    }

    pub fn is_end_word(&self, text: &str) -> bool {
        let text = text.trim();
        self.end_words.iter().any(|w| w.eq_ignore_ascii_case(text))
    }
}

impl Default for InterviewContext {
    fn default() -> Self {
        Self {
            markers: CompletionMarkers::default(),
            kickoff: "Hello! I'm ready to be interviewed.".to_string(),
            greeting: "Hello! I'm here to interview you. Let's start!".to_string(),
            end_words: vec!["quit".to_string(), "exit".to_string(), "done".to_string()],
        }
    }
}
