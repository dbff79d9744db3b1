//! Completion-marker extraction

use super::state::CompletionMarkers;

/// Text strictly between the first `open` marker and the first `close`
/// marker after it, trimmed.
///
/// Returns `None` when either marker is missing. An empty article (markers
/// adjacent or wrapping only whitespace) is still `Some("")`.
pub fn extract_article<'a>(text: &'a str, markers: &CompletionMarkers) -> Option<&'a str> {
    if markers.open.is_empty() || markers.close.is_empty() {
        return None;
    }
    let (_, after_open) = text.split_once(markers.open.as_str())?;
    let (inner, _) = after_open.split_once(markers.close.as_str())?;
    Some(inner.trim())
}
