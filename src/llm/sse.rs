//! Server-sent-event decoding shared by the streaming providers

use super::{FragmentStream, LlmError};
use eventsource_stream::Eventsource;
use futures::future::ready;
use futures::StreamExt;

/// What one decoded SSE event means for the fragment stream
#[derive(Debug)]
pub(super) enum SseStep {
    /// Text to append to the reply
    Fragment(String),
    /// Metadata, keep-alives, empty deltas
    Skip,
    /// Provider signalled the end of the reply
    Done,
    /// Provider reported an error mid-stream
    Error(LlmError),
}

/// Turn a streaming HTTP response into a fragment stream.
///
/// `parse` receives the SSE event name (empty when absent) and its data.
pub(super) fn fragment_stream<F>(response: reqwest::Response, parse: F) -> FragmentStream
where
    F: Fn(&str, &str) -> SseStep + Send + 'static,
{
    response
        .bytes_stream()
        .eventsource()
        .map(move |event| match event {
            Ok(event) => {
                tracing::trace!(event = %event.event, data = %event.data, "LLM SSE event");
                parse(&event.event, &event.data)
            }
            Err(e) => SseStep::Error(LlmError::network(format!("SSE stream error: {e}"))),
        })
        .take_while(|step| ready(!matches!(step, SseStep::Done)))
        .filter_map(|step| {
            ready(match step {
                SseStep::Fragment(text) => Some(Ok(text)),
                SseStep::Error(e) => Some(Err(e)),
                SseStep::Skip | SseStep::Done => None,
            })
        })
        .boxed()
}
