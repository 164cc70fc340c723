//! SSE stream consumption for `stream_task`, following the same
//! background-task parsing design as `client/sse.rs` (a spawned task
//! pushes parsed events into an `mpsc` channel, consumed as a `Stream`).

use crate::error::{FabricResult, OrchestratorError};
use crate::wire::SseEvent;
use futures::stream::{Stream, StreamExt};
use reqwest_eventsource::{Event, EventSource};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A finite, non-restartable stream of [`SseEvent`]s. The consumer may
/// drop it to cancel.
pub struct SseStream {
    rx: mpsc::Receiver<FabricResult<SseEvent>>,
}

impl SseStream {
    /// Open an SSE connection by POSTing `body` to `url` and spawn a
    /// background task that parses `data:` lines into [`SseEvent`]s.
    pub fn connect(client: reqwest::Client, url: String, body: serde_json::Value) -> FabricResult<Self> {
        let request_builder = client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&body);

        let mut source = EventSource::new(request_builder)
            .map_err(|e| OrchestratorError::transport(format!("failed to open SSE stream: {e}")))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(event) = source.next().await {
                let parsed = match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(msg)) => serde_json::from_str::<SseEvent>(&msg.data)
                        .map_err(|e| OrchestratorError::protocol(format!("malformed SSE payload: {e}"))),
                    Err(e) => Err(OrchestratorError::transport(format!("SSE stream error: {e}"))),
                };
                let is_terminal = matches!(&parsed, Ok(evt) if evt.is_terminal());
                let is_err = parsed.is_err();
                if tx.send(parsed).await.is_err() {
                    break;
                }
                if is_terminal || is_err {
                    break;
                }
            }
        });

        Ok(SseStream { rx })
    }
}

impl Stream for SseStream {
    type Item = FabricResult<SseEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
