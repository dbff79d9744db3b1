//! Interview script used as the system instruction
//!
//! The built-in script can be replaced by a file (`INTERVIEW_SCRIPT_PATH`).
//! Either way the completion-marker instruction is appended so the reply that
//! ends the interview can be detected.

use crate::state_machine::CompletionMarkers;
use std::path::Path;

/// Default interviewer persona
const BASE_SCRIPT: &str = r"You are a warm, curious interviewer. Your goal is to learn enough about the person you are talking with to write a compelling short story about them.

Ask one question at a time and keep each message short. Start with their name and where they grew up, then explore a turning point in their life, the people who shaped them, and what they hope for next. Follow up on vivid details instead of moving on too quickly.

Do not write the story until you have asked at least five questions.";

/// Build the system instruction from an optional custom script
pub fn build_system_prompt(script: Option<&str>, markers: &CompletionMarkers) -> String {
    let script = script
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(BASE_SCRIPT);

    format!(
        "{script}\n\nWhen you have enough material, thank the person and write the story in the same message, wrapped in {open} and {close}. Only use these markers once, for the finished story.",
        open = markers.open,
        close = markers.close,
    )
}

/// Read a custom interview script
pub fn read_script(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}
