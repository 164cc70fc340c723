//! Orchestrator host binary. `--a2a` runs the JSON-RPC/SSE/WebSocket
//! server; without it, reads one request from stdin, drives it to
//! completion in-process, and prints the resulting events as JSON.

use agent_fabric::builders::AgentCardBuilder;
use agent_fabric::client::A2AClient;
use agent_fabric::config::{Cli, OrchestratorConfig};
use agent_fabric::llm::EchoGateway;
use agent_fabric::orchestrator::{drive_one_step, InterruptManager, PlanExecuteState, TurnContext};
use agent_fabric::registry::AgentRegistry;
use agent_fabric::server::{router, AppState};
use agent_fabric::store::KvStore;
use clap::Parser;
use std::io::Read;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = OrchestratorConfig::from_env();
    let _guard = agent_fabric::observability::init_tracing(&config.log_level, None);

    let code = match run(cli, config).await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, config: OrchestratorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(A2AClient::new(config.pool.clone(), config.breaker.clone()));
    let registry = Arc::new(AgentRegistry::load("agent_registry.json", client.clone()).await?);

    if cli.a2a {
        let card = AgentCardBuilder::new("orchestrator", "Multi-agent orchestration fabric", env!("CARGO_PKG_VERSION"))
            .with_endpoint("jsonrpc", format!("http://{}:{}/a2a", cli.host, cli.port))
            .with_capability("plan_execute")
            .with_streaming()
            .build();

        let store = Arc::new(KvStore::open(&config.db_path)?);
        let state = Arc::new(AppState::new(
            card,
            Arc::new(EchoGateway),
            registry,
            client,
            Arc::new(InterruptManager::new()),
            store,
        ));

        let app = router(state);
        let addr = format!("{}:{}", cli.host, cli.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(addr, "orchestrator listening");

        tokio::select! {
            result = axum::serve(listener, app) => result.map_err(Into::into),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down on ctrl-c");
                std::process::exit(130);
            }
        }
    } else {
        let mut instruction = String::new();
        std::io::stdin().read_to_string(&mut instruction)?;

        let llm = EchoGateway;
        let interrupts = InterruptManager::new();
        let ctx = TurnContext {
            llm: &llm,
            registry: registry.as_ref(),
            client: client.as_ref(),
            interrupts: &interrupts,
        };
        let mut state = PlanExecuteState::new(instruction.trim(), &config);

        let mut all_events = Vec::new();
        for _ in 0..config.llm.recursion_limit {
            let events = drive_one_step(&ctx, "cli", &mut state).await?;
            let halted = events.iter().any(|e| e.is_terminal());
            all_events.extend(events);
            if halted || state.plan.as_ref().map(|p| p.is_complete()).unwrap_or(false) {
                break;
            }
        }

        println!("{}", serde_json::to_string_pretty(&all_events)?);
        Ok(())
    }
}
