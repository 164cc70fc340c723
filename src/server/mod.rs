//! A2A server surface (C5): JSON-RPC dispatcher, SSE progress stream, and
//! the WebSocket control plane, wired together the way
//! `server/axum_integration.rs` builds its router — one `AppState`, one
//! `Router::new().route(...)` chain per surface.

pub mod event_queue;
pub mod ws_control;

use crate::client::A2AClient;
use crate::error::OrchestratorError;
use crate::llm::LlmGateway;
use crate::orchestrator::interrupt::InterruptManager;
use crate::orchestrator::plan::PlanExecuteState;
use crate::orchestrator::{drive_one_step, TurnContext};
use crate::registry::AgentRegistry;
use crate::store::KvStore;
use crate::wire::{AgentCard, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use axum::extract::{ws::WebSocketUpgrade, Json, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use event_queue::EventQueue;
use futures::stream::Stream;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state behind every route, built once at startup.
pub struct AppState {
    /// Self-describing card served at `GET /a2a/agent-card`.
    pub card: AgentCard,
    /// LLM gateway used by the planner/executor/summarizer.
    pub llm: Arc<dyn LlmGateway>,
    /// Agent directory consulted by the planner and executor.
    pub registry: Arc<AgentRegistry>,
    /// Remote-agent client used by the executor.
    pub client: Arc<A2AClient>,
    /// Per-thread interrupt flags.
    pub interrupts: Arc<InterruptManager>,
    /// In-memory thread states, keyed by thread id — the hot path the
    /// driving loop mutates. Flushed to `store` after every step and
    /// rehydrated from it on first touch, so a thread started before a
    /// restart resumes where it left off.
    pub threads: Mutex<HashMap<String, PlanExecuteState>>,
    /// Persistent backing store for thread state (C7).
    pub store: Arc<KvStore>,
    /// Broadcast fan-out so every SSE subscriber of a thread shares the one
    /// driving loop instead of each re-running `drive_one_step` itself.
    pub events: Arc<EventQueue>,
    /// Thread ids with a driving loop already spawned, so a second
    /// subscriber joins the broadcast instead of starting a duplicate.
    driving: Mutex<HashSet<String>>,
}

/// Namespace under which thread state is persisted in the KV store.
fn thread_namespace() -> crate::store::Namespace {
    vec!["threads".to_string()]
}

impl AppState {
    /// Construct app state with a fresh event queue and driver-tracking set.
    pub fn new(
        card: AgentCard,
        llm: Arc<dyn LlmGateway>,
        registry: Arc<AgentRegistry>,
        client: Arc<A2AClient>,
        interrupts: Arc<InterruptManager>,
        store: Arc<KvStore>,
    ) -> Self {
        AppState {
            card,
            llm,
            registry,
            client,
            interrupts,
            threads: Mutex::new(HashMap::new()),
            store,
            events: Arc::new(EventQueue::new()),
            driving: Mutex::new(HashSet::new()),
        }
    }

    /// Load `thread_id`'s state from the KV store, or `None` if never
    /// persisted.
    async fn load_thread_state(&self, thread_id: &str) -> Option<PlanExecuteState> {
        self.store
            .get(thread_namespace(), thread_id.to_string())
            .await
            .ok()
            .flatten()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Flush `thread_id`'s current state to the KV store. Persistence
    /// failures are logged, not propagated — the in-memory map stays
    /// authoritative for the running process.
    async fn persist_thread_state(&self, thread_id: &str, state: &PlanExecuteState) {
        if let Ok(value) = serde_json::to_value(state) {
            if let Err(err) = self.store.put(thread_namespace(), thread_id.to_string(), value).await {
                tracing::warn!(thread_id, error = %err, "failed to persist thread state");
            }
        }
    }
}

/// Build the A2A router: agent card, JSON-RPC dispatch, SSE progress
/// stream, and the WebSocket control plane.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/a2a/agent-card", get(agent_card))
        .route("/a2a", post(json_rpc))
        .route("/a2a/stream", post(stream_plan))
        .route("/a2a/ws", get(ws_upgrade))
        .with_state(state)
}

async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

/// Dispatch a single JSON-RPC request. The only method this surface
/// supports directly is `process_task`, mirroring the wire contract
/// `A2AClient::process_task` calls against remote agents — the
/// orchestrator plays both roles, server to callers and client to the
/// agents it dispatches tasks to.
async fn json_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let id = request.id.clone();
    let result = handle_method(&state, &request).await;
    Json(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(err) => JsonRpcResponse::error(id, err.into()),
    })
}

async fn handle_method(
    state: &Arc<AppState>,
    request: &JsonRpcRequest,
) -> Result<serde_json::Value, OrchestratorError> {
    match request.method.as_str() {
        "process_task" => {
            let params = request
                .params
                .clone()
                .ok_or_else(|| OrchestratorError::protocol("process_task requires params"))?;
            let original_request = params
                .get("task")
                .and_then(|t| t.get("instruction"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| OrchestratorError::validation("task.instruction is required"))?
                .to_string();
            let thread_id = params
                .get("task")
                .and_then(|t| t.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or(&original_request)
                .to_string();

            if !state.threads.lock().await.contains_key(&thread_id) {
                let restored = state.load_thread_state(&thread_id).await;
                state
                    .threads
                    .lock()
                    .await
                    .insert(thread_id.clone(), restored.unwrap_or_else(|| PlanExecuteState::new(original_request, &Default::default())));
            }

            let mut threads = state.threads.lock().await;
            let thread_state = threads.get_mut(&thread_id).expect("just inserted above");

            let ctx = TurnContext {
                llm: state.llm.as_ref(),
                registry: state.registry.as_ref(),
                client: state.client.as_ref(),
                interrupts: state.interrupts.as_ref(),
            };
            let events = drive_one_step(&ctx, &thread_id, thread_state).await?;
            state.persist_thread_state(&thread_id, thread_state).await;
            Ok(serde_json::json!({"events": events}))
        }
        other => Err(OrchestratorError::protocol(format!("unknown method: {other}"))),
    }
}

/// Stream plan-execution progress via SSE. The first subscriber for a given
/// thread spawns the one driving loop for that thread (publishing into
/// [`EventQueue`]); any concurrent subscriber to the same thread just taps
/// the broadcast instead of re-running `drive_one_step` itself, so a thread
/// is never driven twice in parallel.
async fn stream_plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    use async_stream::stream;

    let thread_id = request
        .params
        .as_ref()
        .and_then(|p| p.get("task"))
        .and_then(|t| t.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or("anonymous")
        .to_string();
    let original_request = request
        .params
        .as_ref()
        .and_then(|p| p.get("task"))
        .and_then(|t| t.get("instruction"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut rx = state.events.subscribe(&thread_id).await;

    let already_driving = {
        let mut driving = state.driving.lock().await;
        !driving.insert(thread_id.clone())
    };

    if !already_driving {
        let state = state.clone();
        let thread_id = thread_id.clone();
        tokio::spawn(async move {
            drive_thread_to_terminal(&state, &thread_id, original_request).await;
            state.driving.lock().await.remove(&thread_id);
        });
    }

    let body = stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    if let Ok(line) = event.to_sse_line() {
                        yield Ok(Event::default().data(line));
                    }
                    if terminal {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    };

    Sse::new(body)
}

/// Drive a thread's plan to a terminal event (or error), publishing every
/// event batch to [`EventQueue`] as it's produced. Runs once per thread per
/// SSE subscriber wave; see [`stream_plan`].
async fn drive_thread_to_terminal(state: &AppState, thread_id: &str, original_request: String) {
    if !state.threads.lock().await.contains_key(thread_id) {
        let restored = state.load_thread_state(thread_id).await;
        state
            .threads
            .lock()
            .await
            .insert(thread_id.to_string(), restored.unwrap_or_else(|| PlanExecuteState::new(original_request, &Default::default())));
    }

    loop {
        let mut threads = state.threads.lock().await;
        let thread_state = threads.get_mut(thread_id).expect("inserted above");

        let ctx = TurnContext {
            llm: state.llm.as_ref(),
            registry: state.registry.as_ref(),
            client: state.client.as_ref(),
            interrupts: state.interrupts.as_ref(),
        };
        let events = match drive_one_step(&ctx, thread_id, thread_state).await {
            Ok(events) => events,
            Err(err) => {
                state.persist_thread_state(thread_id, thread_state).await;
                drop(threads);
                let event = crate::wire::SseEvent::new("error", serde_json::json!({"error": err.to_string()}));
                state.events.publish(thread_id, vec![event]).await;
                break;
            }
        };

        state.persist_thread_state(thread_id, thread_state).await;
        let halted = events.is_empty() || events.iter().any(|e| e.is_terminal());
        drop(threads);
        state.events.publish(thread_id, events).await;
        if halted {
            break;
        }
    }

    // Dropping the sender unblocks any subscriber still waiting on `recv` —
    // notably the interrupted-thread case, where the loop above halts
    // without ever publishing an event.
    state.events.close(thread_id).await;
}

async fn ws_upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_control::handle_socket(socket, state.interrupts.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_without_panicking() {
        fn _assert_router_type(_: Router) {}
    }
}
