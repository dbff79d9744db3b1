//! Pure state transition function

use super::extract::extract_article;
use super::state::{render_transcript, Conversation, InterviewContext, InterviewState, Turn};
use super::{Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: InterviewState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: InterviewState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events rejected in the current state. The state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Interview has not started")]
    NotStarted,
    #[error("Interview already started")]
    AlreadyStarted,
    #[error("Still waiting for the interviewer's reply")]
    AwaitingReply,
    #[error("Interview is wrapping up")]
    Concluding,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// `conversation` is read-only here; changes to it are expressed as
/// `AppendTurn` and `ResetConversation` effects applied by the runtime.
pub fn transition(
    state: &InterviewState,
    conversation: &Conversation,
    context: &InterviewContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Start
        // ============================================================
        (InterviewState::NotStarted, Event::Start) => {
            let seed = context.seed_turns();
            Ok(TransitionResult::new(InterviewState::AwaitingUser)
                .with_effects(seed.iter().cloned().map(Effect::AppendTurn))
                .with_effect(Effect::persist(&conversation.id, seed.to_vec()))
                .with_effects(seed.iter().map(Effect::notify_turn))
                .with_effect(Effect::notify_state_change("awaiting_user")))
        }

        (_, Event::Start) => Err(TransitionError::AlreadyStarted),

        // ============================================================
        // User input
        // ============================================================
        (InterviewState::AwaitingUser, Event::UserMessage { text }) => {
            if context.is_end_word(&text) {
                return transition(state, conversation, context, Event::EndRequested);
            }
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let mut history = conversation.turns.clone();
            history.push(Turn::user(text.clone()));

            Ok(
                TransitionResult::new(InterviewState::AwaitingAssistant { pending: text })
                    .with_effect(Effect::RequestReply { history })
                    .with_effect(Effect::notify_state_change("awaiting_assistant")),
            )
        }

        (InterviewState::NotStarted, Event::UserMessage { .. } | Event::EndRequested) => {
            Err(TransitionError::NotStarted)
        }
        (
            InterviewState::AwaitingAssistant { .. },
            Event::UserMessage { .. } | Event::EndRequested,
        ) => Err(TransitionError::AwaitingReply),
        (InterviewState::Concluding, Event::UserMessage { .. } | Event::EndRequested) => {
            Err(TransitionError::Concluding)
        }

        // ============================================================
        // LLM reply
        // ============================================================
        (InterviewState::AwaitingAssistant { pending }, Event::LlmReply { text }) => {
            let user_turn = Turn::user(pending.clone());
            let assistant_turn = Turn::assistant(text);

            let result = TransitionResult::new(InterviewState::AwaitingUser)
                .with_effect(Effect::AppendTurn(user_turn.clone()))
                .with_effect(Effect::AppendTurn(assistant_turn.clone()))
                .with_effect(Effect::persist(
                    &conversation.id,
                    vec![assistant_turn.clone()],
                ))
                .with_effect(Effect::notify_turn(&user_turn))
                .with_effect(Effect::notify_turn(&assistant_turn));

            match extract_article(&assistant_turn.content, &context.markers) {
                Some(article) => {
                    let mut turns = conversation.turns.clone();
                    turns.push(user_turn.clone());
                    turns.push(assistant_turn.clone());

                    let mut result = result.with_effects(completion_effects(
                        render_transcript(&turns),
                        article.to_string(),
                    ));
                    result.new_state = InterviewState::NotStarted;
                    Ok(result)
                }
                None => Ok(result.with_effect(Effect::notify_state_change("awaiting_user"))),
            }
        }

        // Failed turns are dropped; the user may resubmit
        (InterviewState::AwaitingAssistant { .. }, Event::LlmFailed { message, kind }) => {
            Ok(TransitionResult::new(InterviewState::AwaitingUser)
                .with_effect(Effect::notify_llm_error(&message, kind))
                .with_effect(Effect::notify_state_change("awaiting_user")))
        }

        // ============================================================
        // Explicit end
        // ============================================================
        (InterviewState::AwaitingUser, Event::EndRequested) => {
            let seed_len = context.seed_turns().len();
            if conversation.turns.len() > seed_len {
                Ok(TransitionResult::new(InterviewState::Concluding)
                    .with_effect(Effect::RequestStory {
                        transcript: conversation.transcript(),
                    })
                    .with_effect(Effect::notify_state_change("concluding")))
            } else {
                Ok(TransitionResult::new(InterviewState::NotStarted)
                    .with_effect(Effect::ResetConversation)
                    .with_effect(Effect::notify_state_change("not_started")))
            }
        }

        (InterviewState::Concluding, Event::StoryReady { story }) => {
            let story = story.trim().to_string();
            Ok(TransitionResult::new(InterviewState::NotStarted)
                .with_effects(completion_effects(conversation.transcript(), story)))
        }

        (InterviewState::Concluding, Event::StoryFailed { message }) => {
            Ok(TransitionResult::new(InterviewState::NotStarted)
                .with_effect(Effect::notify_error(&message))
                .with_effect(Effect::ResetConversation)
                .with_effect(Effect::notify_state_change("not_started")))
        }

        // ============================================================
        // Abandon
        // ============================================================
        (_, Event::Abandon) => {
            let mut result = TransitionResult::new(InterviewState::NotStarted);
            if state.is_busy() {
                result = result.with_effect(Effect::AbortLlm);
            }
            Ok(result
                .with_effect(Effect::ResetConversation)
                .with_effect(Effect::notify_state_change("not_started")))
        }

        // Late LLM results, e.g. after an abandon
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} on {event:?}",
            state.display_name()
        ))),
    }
}

/// Mail, then reset and notify: the tail shared by marker and explicit completion.
/// `completed` follows the mail so a mail error reaches the client first.
fn completion_effects(transcript: String, article: String) -> Vec<Effect> {
    let completed = Effect::notify_completed(&article);
    vec![
        Effect::SendMail {
            transcript,
            article,
        },
        completed,
        Effect::ResetConversation,
        Effect::notify_state_change("not_started"),
    ]
}
