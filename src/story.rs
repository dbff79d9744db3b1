//! Story generation when the user ends an interview explicitly

use crate::llm::{LlmError, LlmMessage, LlmRequest};
use crate::runtime::LlmClient;
use std::time::Duration;
use tokio::time::timeout;

const STORY_PROMPT: &str =
    "Based on the following interview transcript, write a compelling story about the interviewee:";

const STORY_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the one-shot story request for a transcript
pub fn story_request(transcript: &str, max_tokens: u32, temperature: f32) -> LlmRequest {
    LlmRequest::new(vec![LlmMessage::user(format!(
        "{STORY_PROMPT}\n\n{transcript}"
    ))])
    .with_max_tokens(max_tokens)
    .with_temperature(temperature)
}

/// Ask the model for a story in batch mode.
///
/// An empty reply counts as a failure so nothing blank gets mailed.
pub async fn generate_story<L: LlmClient + ?Sized>(
    llm: &L,
    request: &LlmRequest,
) -> Result<String, LlmError> {
    let response = timeout(STORY_TIMEOUT, llm.complete(request))
        .await
        .map_err(|_| LlmError::network("Story generation timed out"))??;

    let story = response.text.trim();
    if story.is_empty() {
        return Err(LlmError::unknown("Story generation returned no text"));
    }
    Ok(story.to_string())
}
