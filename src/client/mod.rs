//! HTTP client for calling remote A2A agents: card discovery, request
//! transport, and SSE streaming.

mod a2a_client;
mod card_resolver;
mod sse;
mod transport;

pub use a2a_client::A2AClient;
pub use card_resolver::CardResolver;
pub use sse::SseStream;
pub use transport::JsonRpcTransport;
