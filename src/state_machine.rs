//! Interview state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! runtime owns the state and conversation and executes the returned effects.

mod effect;
pub mod event;
mod extract;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{CompletionMarkers, Conversation, InterviewContext, InterviewState, Role, Turn};
pub use transition::transition;
#[allow(unused_imports)] // Public API re-exports
pub use extract::extract_article;
#[allow(unused_imports)]
pub use state::render_transcript;
#[allow(unused_imports)]
pub use transition::{TransitionError, TransitionResult};
