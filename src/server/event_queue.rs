//! Broadcast-backed SSE fan-out, following the same per-task `EventQueue`
//! pattern, generalized to per-thread plan-execution events instead of
//! per-task A2A status updates.

use crate::wire::SseEvent;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

const CHANNEL_CAPACITY: usize = 256;

/// Per-thread broadcast channels for SSE fan-out. A single producer
/// (the orchestrator driving loop) publishes; any number of HTTP/SSE
/// handlers may subscribe to the same thread's stream.
#[derive(Default)]
pub struct EventQueue {
    channels: RwLock<HashMap<String, broadcast::Sender<SseEvent>>>,
}

impl EventQueue {
    /// Build an empty queue.
    pub fn new() -> Self {
        EventQueue::default()
    }

    async fn sender_for(&self, thread_id: &str) -> broadcast::Sender<SseEvent> {
        if let Some(tx) = self.channels.read().await.get(thread_id) {
            return tx.clone();
        }
        let mut guard = self.channels.write().await;
        guard
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish `events` to every subscriber of `thread_id`. Silently drops
    /// events if there are currently no subscribers (broadcast semantics).
    pub async fn publish(&self, thread_id: &str, events: Vec<SseEvent>) {
        let tx = self.sender_for(thread_id).await;
        for event in events {
            let _ = tx.send(event);
        }
    }

    /// Subscribe to `thread_id`'s event stream.
    pub async fn subscribe(&self, thread_id: &str) -> broadcast::Receiver<SseEvent> {
        self.sender_for(thread_id).await.subscribe()
    }

    /// Drop the channel for `thread_id`, disconnecting any subscribers.
    pub async fn close(&self, thread_id: &str) {
        self.channels.write().await.remove(thread_id);
    }
}
