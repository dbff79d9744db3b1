//! Events that drive an interview

use crate::llm::LlmErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Start,
    UserMessage { text: String },
    EndRequested,
    Abandon,

    // LLM events
    /// Full reply, fragments already concatenated
    LlmReply { text: String },
    LlmFailed {
        message: String,
        kind: LlmErrorKind,
    },
    StoryReady { story: String },
    StoryFailed { message: String },
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }

    pub fn llm_reply(text: impl Into<String>) -> Self {
        Event::LlmReply { text: text.into() }
    }
}
