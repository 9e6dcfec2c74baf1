//! Server-Sent Events support

use crate::runtime::{Notice, SessionSnapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert the notice broadcast to an SSE stream, starting with a snapshot
pub fn sse_stream(
    snapshot: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<Notice>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(notice) => Some(Ok(notice_event(&notice))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &SessionSnapshot) -> Event {
    let data = json!({ "type": "init", "session": snapshot });
    Event::default().event("init").data(data.to_string())
}

fn notice_event(notice: &Notice) -> Event {
    let data = serde_json::to_string(notice).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(notice.event_type()).data(data)
}
