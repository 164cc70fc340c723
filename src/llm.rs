//! LLM gateway: an object-safe async trait implemented by callers, shaped
//! like the `AgentExecutor` trait and
//! `original_source/src/orchestrator/llm_handler.py`'s `invoke_llm`
//! contract (sync invoke plus a streaming variant, with a deterministic
//! low-temperature mode for format-sensitive calls).

use crate::error::FabricResult;
use async_trait::async_trait;

/// A single chat message passed to the gateway.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl LlmMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        LlmMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        LlmMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call sampling override. `None` fields fall back to the gateway's
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Nucleus sampling override.
    pub top_p: Option<f32>,
}

impl InvokeOptions {
    /// Deterministic options (temperature 0, top_p 0.1) for format-sensitive
    /// calls like conversation summarization.
    pub fn deterministic() -> Self {
        InvokeOptions {
            temperature: Some(0.0),
            top_p: Some(0.1),
        }
    }
}

/// Gateway to an LLM provider. Implementations own provider auth/config;
/// callers only see `invoke`/`invoke_stream`.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Invoke the model and return its full text response.
    async fn invoke(&self, messages: &[LlmMessage], options: InvokeOptions) -> FabricResult<String>;

    /// Invoke the model, returning incremental text chunks.
    async fn invoke_stream(
        &self,
        messages: &[LlmMessage],
        options: InvokeOptions,
    ) -> FabricResult<tokio::sync::mpsc::Receiver<FabricResult<String>>> {
        // Default implementation: fall back to a single non-streaming call
        // wrapped as a one-shot channel, for gateways that don't support
        // true token streaming.
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let result = self.invoke(messages, options).await;
        let _ = tx.send(result).await;
        Ok(rx)
    }
}

/// Deterministic stand-in gateway used by tests and local development: no
/// network calls, returns canned content derived from the last user message.
pub struct EchoGateway;

#[async_trait]
impl LlmGateway for EchoGateway {
    async fn invoke(&self, messages: &[LlmMessage], _options: InvokeOptions) -> FabricResult<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("Echo: {last_user}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_gateway_reflects_last_user_message() {
        let gateway = EchoGateway;
        let messages = vec![LlmMessage::system("be concise"), LlmMessage::user("hello")];
        let response = gateway.invoke(&messages, InvokeOptions::default()).await.unwrap();
        assert_eq!(response, "Echo: hello");
    }

    #[test]
    fn deterministic_options_are_low_temperature() {
        let opts = InvokeOptions::deterministic();
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.top_p, Some(0.1));
    }
}
