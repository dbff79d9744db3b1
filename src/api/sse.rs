//! Server-Sent Events support

use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Event name and JSON payload; every payload carries its own `type`
fn event_payload(event: SseEvent) -> (String, Value) {
    match event {
        SseEvent::Init { snapshot } => (
            "init".to_string(),
            json!({
                "type": "init",
                "state": snapshot.state,
                "conversation_id": snapshot.conversation_id,
                "turns": snapshot.turns,
            }),
        ),
        SseEvent::Delta { text } => (
            "delta".to_string(),
            json!({ "type": "delta", "text": text }),
        ),
        SseEvent::Notify { event_type, data } => {
            let mut payload = match data {
                Value::Object(map) => map,
                other => {
                    let mut map = serde_json::Map::new();
                    map.insert("data".to_string(), other);
                    map
                }
            };
            payload.insert("type".to_string(), Value::String(event_type.clone()));
            (event_type, Value::Object(payload))
        }
        SseEvent::Error { message } => (
            "error".to_string(),
            json!({ "type": "error", "message": message }),
        ),
    }
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}
