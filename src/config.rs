//! Runtime configuration: CLI flags (`clap`) plus environment variables,
//! collected once at startup and threaded through via constructor
//! injection rather than read ad hoc from business logic.

use clap::Parser;
use std::time::Duration;

/// CLI surface for the orchestrator binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "orchestrator", version, about = "Multi-agent orchestration fabric")]
pub struct Cli {
    /// Run as an A2A server instead of a one-shot client invocation.
    #[arg(long = "a2a")]
    pub a2a: bool,

    /// Port to bind the HTTP/SSE/WebSocket server on.
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Host/address to bind the server on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
}

/// Pool sizing and timeout defaults.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum in-flight requests per endpoint.
    pub max_in_flight: usize,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Per-request read timeout.
    pub read_timeout: Duration,
    /// Total request timeout (connect + send + read).
    pub total_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_in_flight: 20,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(120),
            total_timeout: Duration::from_secs(120),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before tripping to `Open`.
    pub failure_threshold: u32,
    /// Time spent `Open` before probing with a half-open call.
    pub open_timeout: Duration,
    /// Calls allowed through while `HalfOpen`.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

/// LLM gateway defaults.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier, e.g. `"gpt-4o"`.
    pub model: String,
    /// Sampling temperature for the conversational path.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum planner/executor recursion depth before failing with `Capacity`.
    pub recursion_limit: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            recursion_limit: 15,
        }
    }
}

/// Top-level runtime configuration, assembled once at startup from CLI
/// flags and environment variables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    // NOTE: `Default` below covers AppState's per-request `PlanExecuteState::new`
    // call, which only needs the struct shape, not environment-derived values.
    /// Base URL this orchestrator is reachable at (`ORCHESTRATOR_URL`).
    pub orchestrator_url: String,
    /// `tracing` env-filter directive (`LOG_LEVEL`, default `"info"`).
    pub log_level: String,
    /// Path to the SQLite-backed KV store (`DB_PATH`).
    pub db_path: String,
    /// Enables verbose debug logging and relaxed validation (`DEBUG_MODE`).
    pub debug_mode: bool,
    /// Connection pool defaults.
    pub pool: PoolConfig,
    /// Circuit breaker defaults.
    pub breaker: BreakerConfig,
    /// LLM gateway defaults.
    pub llm: LlmConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            orchestrator_url: "http://localhost:8000".to_string(),
            log_level: "info".to_string(),
            db_path: "orchestrator.sqlite3".to_string(),
            debug_mode: false,
            pool: PoolConfig::default(),
            breaker: BreakerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Build the configuration from environment variables, following the
    /// one-struct-per-concern pattern. Secrets (LLM API keys, per-agent
    /// credentials) are read via `std::env::var` at the call sites that
    /// need them and are never stored here or logged.
    pub fn from_env() -> Self {
        let llm_temperature = std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.3);
        let llm_timeout_secs = std::env::var("LLM_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        let recursion_limit = std::env::var("LLM_RECURSION_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(15);

        OrchestratorConfig {
            orchestrator_url: std::env::var("ORCHESTRATOR_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "orchestrator.sqlite3".to_string()),
            debug_mode: std::env::var("DEBUG_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            pool: PoolConfig::default(),
            breaker: BreakerConfig::default(),
            llm: LlmConfig {
                model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                temperature: llm_temperature,
                timeout: Duration::from_secs(llm_timeout_secs),
                recursion_limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_defaults_match_spec() {
        let pool = PoolConfig::default();
        assert_eq!(pool.max_in_flight, 20);
        assert_eq!(pool.connect_timeout, Duration::from_secs(30));
        assert_eq!(pool.read_timeout, Duration::from_secs(120));
        assert_eq!(pool.total_timeout, Duration::from_secs(120));
    }

    #[test]
    fn breaker_defaults_match_spec() {
        let breaker = BreakerConfig::default();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.open_timeout, Duration::from_secs(30));
        assert_eq!(breaker.half_open_max_calls, 3);
    }

    #[test]
    fn llm_defaults_match_spec() {
        let llm = LlmConfig::default();
        assert_eq!(llm.temperature, 0.3);
        assert_eq!(llm.recursion_limit, 15);
    }

    #[test]
    fn cli_parses_a2a_flags() {
        let cli = Cli::parse_from(["orchestrator", "--a2a", "--port", "9000", "--host", "127.0.0.1"]);
        assert!(cli.a2a);
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.host, "127.0.0.1");
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["orchestrator"]);
        assert!(!cli.a2a);
        assert_eq!(cli.port, 8000);
        assert_eq!(cli.host, "0.0.0.0");
    }
}
